//! Outbound side of a transfer.
//!
//! One [`TransferSender::send`] call is one connection and one attempt.
//! Retrying, or moving on to the next recipient, is the caller's decision.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use lanshare_shared::constants::{DEFAULT_CHUNK_SIZE, FOLDER_CHECKSUM};
use lanshare_shared::Handshake;

use crate::archive::pack_directory;
use crate::checksum::file_checksum_async;
use crate::error::TransferError;
use crate::protocol::{copy_exact, read_ack, write_handshake};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Largest single read/write while streaming.
    pub chunk_size: usize,
    /// Applies to the TCP connect only. An established stream has no timeout.
    pub connect_timeout: Duration,
    /// Where directory archives are staged before sending.
    pub staging_dir: PathBuf,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(5),
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// Result of a completed send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    /// Name announced in the handshake.
    pub item_name: String,
    pub bytes_sent: u64,
    /// Hex BLAKE3 of the file, or the folder sentinel for directories.
    pub checksum: String,
}

// ---------------------------------------------------------------------------
// Temporary archive guard
// ---------------------------------------------------------------------------

/// Staged archive that is removed when dropped, whatever the send outcome.
struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    fn new(staging_dir: &Path, dir_name: &str) -> Self {
        let path = staging_dir.join(format!("lanshare-{}-{dir_name}.tar", uuid::Uuid::new_v4()));
        Self { path }
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staged archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove staged archive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TransferSender {
    config: SenderConfig,
}

impl TransferSender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// Send a file or directory to the receiver listening at `addr`.
    pub async fn send(&self, path: &Path, addr: SocketAddr) -> Result<SendReport, TransferError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| TransferError::SourceMissing(path.to_path_buf()))?;
        let name = item_name(path)?;

        if metadata.is_dir() {
            self.send_directory(path, &name, addr).await
        } else {
            self.send_file(path, &name, metadata.len(), addr).await
        }
    }

    async fn send_file(
        &self,
        path: &Path,
        name: &str,
        len: u64,
        addr: SocketAddr,
    ) -> Result<SendReport, TransferError> {
        let checksum = file_checksum_async(path).await?;
        let handshake = Handshake::file(name, len);
        let bytes_sent = self.deliver(path, &handshake, addr).await?;

        info!(item = %name, peer = %addr, bytes = bytes_sent, "File sent");
        Ok(SendReport {
            item_name: handshake.item_name,
            bytes_sent,
            checksum,
        })
    }

    async fn send_directory(
        &self,
        path: &Path,
        name: &str,
        addr: SocketAddr,
    ) -> Result<SendReport, TransferError> {
        let archive = TempArchive::new(&self.config.staging_dir, name);

        let src = path.to_path_buf();
        let dest = archive.path.clone();
        let archive_len = tokio::task::spawn_blocking(move || pack_directory(&src, &dest))
            .await
            .map_err(std::io::Error::other)??;
        debug!(dir = %name, archive_len, "Directory packed");

        let handshake = Handshake::directory(name, archive_len);
        let bytes_sent = self.deliver(&archive.path, &handshake, addr).await?;

        info!(dir = %name, peer = %addr, bytes = bytes_sent, "Directory sent");
        Ok(SendReport {
            item_name: handshake.item_name,
            bytes_sent,
            checksum: FOLDER_CHECKSUM.to_string(),
        })
    }

    /// Run the three phases for `payload` on a fresh connection.
    async fn deliver(
        &self,
        payload: &Path,
        handshake: &Handshake,
        addr: SocketAddr,
    ) -> Result<u64, TransferError> {
        let mut file = File::open(payload).await?;

        let mut stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransferError::ConnectTimeout(addr))?
            .map_err(|source| TransferError::Connect { addr, source })?;
        debug!(peer = %addr, item = %handshake.item_name, "Connected");

        write_handshake(&mut stream, handshake).await?;
        read_ack(&mut stream).await?;

        let sent = copy_exact(
            &mut file,
            &mut stream,
            handshake.payload_len,
            self.config.chunk_size,
        )
        .await?;

        // Half-close, then wait for the receiver to finish and close its side.
        let stream_err = |source| TransferError::Stream {
            transferred: sent,
            expected: handshake.payload_len,
            source,
        };
        stream.shutdown().await.map_err(stream_err)?;
        let mut trailing = [0u8; 1];
        loop {
            match stream.read(&mut trailing).await.map_err(stream_err)? {
                0 => break,
                _ => continue,
            }
        }

        Ok(sent)
    }
}

/// Final path component, validated as a transferable item name.
fn item_name(path: &Path) -> Result<String, TransferError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::SourceMissing(path.to_path_buf()))?;
    lanshare_shared::protocol::validate_item_name(name)?;
    Ok(name.to_string())
}
