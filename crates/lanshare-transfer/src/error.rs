use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use lanshare_shared::ProtocolError;

use crate::archive::ArchiveError;

/// Stage of a transfer at which something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    /// Preparing the source or destination on the local disk.
    Local,
    Connect,
    Handshake,
    Stream,
    Archive,
}

impl std::fmt::Display for TransferStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Connect => "connect",
            Self::Handshake => "handshake",
            Self::Stream => "stream",
            Self::Archive => "archive",
        })
    }
}

/// Failure of a single transfer. Never retried by this crate.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Source not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Connect to {0} timed out")]
    ConnectTimeout(SocketAddr),

    #[error("Cannot resolve {0}")]
    Unresolved(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Stream interrupted after {transferred} of {expected} bytes: {source}")]
    Stream {
        transferred: u64,
        expected: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// The step this error belongs to, for user-facing reports.
    pub fn step(&self) -> TransferStep {
        match self {
            Self::SourceMissing(_) | Self::Io(_) => TransferStep::Local,
            Self::Connect { .. } | Self::ConnectTimeout(_) | Self::Unresolved(_) => {
                TransferStep::Connect
            }
            Self::Handshake(_) | Self::Protocol(_) => TransferStep::Handshake,
            Self::Stream { .. } => TransferStep::Stream,
            Self::Archive(_) => TransferStep::Archive,
        }
    }
}
