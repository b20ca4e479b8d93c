use thiserror::Error;

/// Violations of the peer-to-peer wire contract.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Handshake frame too large: {0} bytes (max {max})", max = crate::constants::MAX_HANDSHAKE_LEN)]
    FrameTooLarge(usize),

    #[error("Malformed handshake body: {0}")]
    Malformed(String),

    #[error("Invalid item name: {0:?}")]
    InvalidItemName(String),

    #[error("Unexpected acknowledgement: {0:?}")]
    BadAck(Vec<u8>),

    #[error("Unknown value: {0}")]
    UnknownValue(String),
}
