//! Async read/write helpers for the three transfer phases.
//!
//! Phases are strictly sequential on a connection: handshake, acknowledgement,
//! then exactly `payload_len` bytes of stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use lanshare_shared::constants::{ACK_TOKEN, HANDSHAKE_HEADER_LEN};
use lanshare_shared::{Handshake, ProtocolError};

use crate::error::TransferError;

/// Write one handshake frame.
pub async fn write_handshake<W>(writer: &mut W, handshake: &Handshake) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let frame = handshake.encode()?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| TransferError::Handshake(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TransferError::Handshake(format!("flush failed: {e}")))?;
    Ok(())
}

/// Read one handshake frame: the fixed header, then exactly the announced
/// body. Oversized headers are rejected before any body allocation.
pub async fn read_handshake<R>(reader: &mut R) -> Result<Handshake, TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HANDSHAKE_HEADER_LEN];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| TransferError::Handshake(format!("header read failed: {e}")))?;

    let len = Handshake::body_len(header)?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| TransferError::Handshake(format!("body read failed: {e}")))?;

    Ok(Handshake::decode_body(&body)?)
}

/// Signal readiness for the payload.
pub async fn write_ack<W>(writer: &mut W) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(ACK_TOKEN)
        .await
        .map_err(|e| TransferError::Handshake(format!("ack write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TransferError::Handshake(format!("ack flush failed: {e}")))?;
    Ok(())
}

/// Wait for the acknowledgement. Anything else, including a closed
/// connection, is a handshake failure.
pub async fn read_ack<R>(reader: &mut R) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin,
{
    let mut token = [0u8; ACK_TOKEN.len()];
    reader
        .read_exact(&mut token)
        .await
        .map_err(|e| TransferError::Handshake(format!("no acknowledgement: {e}")))?;

    if &token != ACK_TOKEN {
        return Err(ProtocolError::BadAck(token.to_vec()).into());
    }
    Ok(())
}

/// Copy exactly `len` bytes from `src` to `dst` in chunks of at most
/// `chunk_size`, writing each chunk as soon as it is read.
///
/// Running out of input before `len` bytes, on either side, is a
/// [`TransferError::Stream`].
pub async fn copy_exact<R, W>(
    src: &mut R,
    dst: &mut W,
    len: u64,
    chunk_size: usize,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut transferred = 0u64;

    let fail = |transferred: u64, source: std::io::Error| TransferError::Stream {
        transferred,
        expected: len,
        source,
    };

    while transferred < len {
        let want = usize::try_from(len - transferred).map_or(buf.len(), |rest| rest.min(buf.len()));
        let n = src
            .read(&mut buf[..want])
            .await
            .map_err(|e| fail(transferred, e))?;
        if n == 0 {
            return Err(fail(
                transferred,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed mid-stream"),
            ));
        }
        dst.write_all(&buf[..n])
            .await
            .map_err(|e| fail(transferred, e))?;
        transferred += n as u64;
    }

    dst.flush().await.map_err(|e| fail(transferred, e))?;
    Ok(transferred)
}
