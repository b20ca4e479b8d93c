//! Directory records persisted in SQLite.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lanshare_shared::{PeerStatus, TransferOutcome, Visibility};

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// A node known to the directory, keyed by its unique display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    /// Address other peers dial to reach this node's receiver.
    pub address: String,
    /// Port of this node's receiver.
    pub port: u16,
    pub status: PeerStatus,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// File record
// ---------------------------------------------------------------------------

/// Metadata for a shared file or directory. Visibility never changes after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Server-assigned, monotonically increasing id.
    pub id: i64,
    pub filename: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Hex BLAKE3 digest, or the folder sentinel for directories.
    pub checksum: String,
    pub owner: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Database::register_file`](crate::Database::register_file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFile {
    pub filename: String,
    pub size: u64,
    pub checksum: String,
    pub owner: String,
    pub visibility: Visibility,
    /// Grantees. Ignored for `public` files.
    #[serde(default)]
    pub recipients: Vec<String>,
}

// ---------------------------------------------------------------------------
// Permission grant
// ---------------------------------------------------------------------------

/// Explicit authorization of one peer for one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionGrant {
    pub file_id: i64,
    pub peer_name: String,
    pub granted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transfer log
// ---------------------------------------------------------------------------

/// One attempted delivery. Rows are history: never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferLogEntry {
    pub id: i64,
    pub file_id: i64,
    pub from_peer: String,
    pub to_peer: String,
    pub outcome: TransferOutcome,
    pub transferred_at: DateTime<Utc>,
}

/// A transfer log row joined with the file it refers to, for history views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferHistoryItem {
    #[serde(flatten)]
    pub entry: TransferLogEntry,
    pub filename: String,
    pub size: u64,
}
