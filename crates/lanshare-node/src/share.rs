//! Sending one item to one or more peers.
//!
//! The item is registered with the directory once, then delivered to each
//! recipient in turn. Every attempt is logged, and one recipient's failure
//! never stops delivery to the others.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use lanshare_shared::constants::FOLDER_CHECKSUM;
use lanshare_shared::{PeerStatus, TransferOutcome, Visibility};
use lanshare_store::{NewFile, Peer};
use lanshare_transfer::{file_checksum_async, tree_size, TransferError, TransferSender};

use crate::directory::Directory;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Nothing to send at {0}")]
    SourceMissing(PathBuf),

    #[error("No valid recipients")]
    NoRecipients,

    #[error("Directory refused to register {0}")]
    Registration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Who an item goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every online peer except the sender. The file is public.
    Everyone,
    /// Named peers. One resolved recipient makes the file private, several
    /// distinct ones make it shared.
    Named(Vec<String>),
}

impl Recipients {
    /// `*` anywhere in the list means everyone.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        if args.iter().any(|a| a.as_ref() == "*") {
            Self::Everyone
        } else {
            Self::Named(args.iter().map(|a| a.as_ref().to_string()).collect())
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub outcome: TransferOutcome,
    pub bytes_sent: u64,
    /// Step and message of the failure, if any.
    pub error: Option<String>,
    /// Whether the attempt made it into the transfer log.
    pub logged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareReport {
    pub file_id: i64,
    pub filename: String,
    pub size: u64,
    pub checksum: String,
    pub visibility: Visibility,
    /// Requested names the directory did not know (or knew as offline).
    pub skipped: Vec<String>,
    pub outcomes: Vec<RecipientOutcome>,
}

impl ShareReport {
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_success())
            .count()
    }
}

/// Register `path` with the directory as owned by `me` and send it to each
/// resolved recipient, sequentially.
pub async fn share<D: Directory>(
    directory: &D,
    sender: &TransferSender,
    me: &str,
    path: &Path,
    recipients: &Recipients,
) -> Result<ShareReport, ShareError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ShareError::SourceMissing(path.to_path_buf()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ShareError::SourceMissing(path.to_path_buf()))?;

    let (visibility, peers, skipped) = resolve(directory, me, recipients).await;
    if peers.is_empty() {
        return Err(ShareError::NoRecipients);
    }

    let (size, checksum) = if metadata.is_dir() {
        let dir = path.to_path_buf();
        let (bytes, _) = tokio::task::spawn_blocking(move || tree_size(&dir))
            .await
            .map_err(std::io::Error::other)??;
        (bytes, FOLDER_CHECKSUM.to_string())
    } else {
        (metadata.len(), file_checksum_async(path).await?)
    };

    let record = NewFile {
        filename: filename.clone(),
        size,
        checksum: checksum.clone(),
        owner: me.to_string(),
        visibility,
        recipients: peers.iter().map(|p| p.name.clone()).collect(),
    };
    let file_id = directory
        .register_file(&record)
        .await
        .ok_or_else(|| ShareError::Registration(filename.clone()))?;
    info!(file_id, item = %filename, size, visibility = %visibility, recipients = peers.len(), "Sharing");

    let mut outcomes = Vec::with_capacity(peers.len());
    for peer in &peers {
        let attempt = deliver(sender, path, peer).await;
        let (outcome, bytes_sent, error) = match attempt {
            Ok(bytes) => (TransferOutcome::Success, bytes, None),
            Err(e) => {
                warn!(peer = %peer.name, step = %e.step(), error = %e, "Delivery failed");
                (TransferOutcome::Failed, 0, Some(format!("{}: {e}", e.step())))
            }
        };
        let logged = directory.log_transfer(file_id, me, &peer.name, outcome).await;
        outcomes.push(RecipientOutcome {
            recipient: peer.name.clone(),
            outcome,
            bytes_sent,
            error,
            logged,
        });
    }

    Ok(ShareReport {
        file_id,
        filename,
        size,
        checksum,
        visibility,
        skipped,
        outcomes,
    })
}

/// Visibility, online recipients, and requested names that were skipped.
async fn resolve<D: Directory>(
    directory: &D,
    me: &str,
    recipients: &Recipients,
) -> (Visibility, Vec<Peer>, Vec<String>) {
    match recipients {
        Recipients::Everyone => {
            let peers = directory
                .online_peers()
                .await
                .into_iter()
                .filter(|p| p.name != me)
                .collect();
            (Visibility::Public, peers, Vec::new())
        }
        Recipients::Named(names) => {
            let mut peers: Vec<Peer> = Vec::new();
            let mut skipped = Vec::new();
            for name in names {
                if peers.iter().any(|p| &p.name == name) {
                    continue;
                }
                match directory.get_peer(name).await {
                    Some(peer) if peer.status == PeerStatus::Online => peers.push(peer),
                    _ => {
                        warn!(peer = %name, "Recipient unknown or offline, skipping");
                        skipped.push(name.clone());
                    }
                }
            }
            (Visibility::for_recipient_count(peers.len()), peers, skipped)
        }
    }
}

async fn deliver(sender: &TransferSender, path: &Path, peer: &Peer) -> Result<u64, TransferError> {
    let addr = resolve_addr(peer).await?;
    sender.send(path, addr).await.map(|report| report.bytes_sent)
}

async fn resolve_addr(peer: &Peer) -> Result<SocketAddr, TransferError> {
    let unresolved = || TransferError::Unresolved(format!("{}:{}", peer.address, peer.port));
    let mut addrs = tokio::net::lookup_host((peer.address.as_str(), peer.port))
        .await
        .map_err(|_| unresolved())?;
    addrs.next().ok_or_else(unresolved)
}
