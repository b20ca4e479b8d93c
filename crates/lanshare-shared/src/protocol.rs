//! Handshake frame exchanged before every payload stream.
//!
//! On the wire a frame is a 4-byte big-endian body length followed by exactly
//! that many bytes of bincode-encoded [`Handshake`]. The receiver answers with
//! [`ACK_TOKEN`](crate::constants::ACK_TOKEN) and the sender then writes
//! `payload_len` raw bytes.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::constants::{ARCHIVE_SUFFIX, HANDSHAKE_HEADER_LEN, MAX_HANDSHAKE_LEN, MAX_ITEM_NAME_LEN};
use crate::error::ProtocolError;
use crate::types::ItemKind;

/// Describes the payload that follows on the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Name the receiver stores the item under (archive suffix included for
    /// directories).
    pub item_name: String,
    /// Exact number of payload bytes that follow the acknowledgement.
    pub payload_len: u64,
    pub kind: ItemKind,
}

impl Handshake {
    pub fn file(name: impl Into<String>, payload_len: u64) -> Self {
        Self {
            item_name: name.into(),
            payload_len,
            kind: ItemKind::File,
        }
    }

    /// Handshake for a packed directory; the archive suffix is appended here.
    pub fn directory(dir_name: &str, archive_len: u64) -> Self {
        Self {
            item_name: format!("{dir_name}{ARCHIVE_SUFFIX}"),
            payload_len: archive_len,
            kind: ItemKind::ArchivedDirectory,
        }
    }

    /// Name presented to the user: directories lose their archive suffix.
    pub fn display_name(&self) -> &str {
        match self.kind {
            ItemKind::ArchivedDirectory => self
                .item_name
                .strip_suffix(ARCHIVE_SUFFIX)
                .unwrap_or(&self.item_name),
            ItemKind::File => &self.item_name,
        }
    }

    /// Encode as header + body, ready to be written in one call.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        validate_item_name(&self.item_name)?;

        let body = bincode::serialize(self).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        if body.len() > MAX_HANDSHAKE_LEN {
            return Err(ProtocolError::FrameTooLarge(body.len()));
        }

        let mut buf = BytesMut::with_capacity(HANDSHAKE_HEADER_LEN + body.len());
        buf.put_u32(body.len() as u32);
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Interpret the fixed-width header, returning the body length to read.
    pub fn body_len(header: [u8; HANDSHAKE_HEADER_LEN]) -> Result<usize, ProtocolError> {
        let len = u32::from_be_bytes(header) as usize;
        if len == 0 {
            return Err(ProtocolError::Malformed("empty handshake body".into()));
        }
        if len > MAX_HANDSHAKE_LEN {
            return Err(ProtocolError::FrameTooLarge(len));
        }
        Ok(len)
    }

    /// Decode and validate a handshake body.
    pub fn decode_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let handshake: Handshake =
            bincode::deserialize(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        validate_item_name(&handshake.item_name)?;
        if handshake.kind.is_directory() {
            // The unpack target is the name minus its suffix, so it must be
            // valid on its own.
            match handshake.item_name.strip_suffix(ARCHIVE_SUFFIX) {
                Some(dir_name) => validate_item_name(dir_name)?,
                None => return Err(ProtocolError::InvalidItemName(handshake.item_name)),
            }
        }
        Ok(handshake)
    }
}

/// Reject names that could escape the receiver's storage directory.
pub fn validate_item_name(name: &str) -> Result<(), ProtocolError> {
    let bad = name.is_empty()
        || name.len() > MAX_ITEM_NAME_LEN
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(ProtocolError::InvalidItemName(name.to_string()));
    }
    Ok(())
}
