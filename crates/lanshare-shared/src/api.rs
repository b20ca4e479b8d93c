//! JSON bodies of the directory service's HTTP surface.
//!
//! Record-carrying responses (peers, files, history) serialize the store's
//! models directly; the small request/acknowledgement shapes live here so the
//! server and the node agree on them.

use serde::{Deserialize, Serialize};

use crate::types::TransferOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPeerRequest {
    pub name: String,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregisterPeerRequest {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRegistered {
    pub file_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPermissionRequest {
    pub peer_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTransferRequest {
    pub file_id: i64,
    pub from_peer: String,
    pub to_peer: String,
    pub outcome: TransferOutcome,
}

/// Plain `{"status": ...}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAck {
    pub status: String,
}

impl StatusAck {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub version: String,
    pub peers_total: u64,
    pub peers_online: u64,
    /// RFC 3339.
    pub timestamp: String,
}
