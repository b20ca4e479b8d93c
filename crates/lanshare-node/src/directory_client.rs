//! HTTP client for the directory service.
//!
//! Every public method degrades instead of failing: network errors, error
//! statuses and undecodable bodies are logged at `warn` and turned into
//! `None`, `false` or an empty list.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use lanshare_shared::api::{
    CheckPermissionRequest, FileRegistered, LogTransferRequest, PermissionResponse,
    RegisterPeerRequest, ServiceStatus, StatusAck, UnregisterPeerRequest,
};
use lanshare_shared::TransferOutcome;
use lanshare_store::{NewFile, Peer, TransferHistoryItem};

use crate::directory::Directory;

#[derive(Debug, Error)]
enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("directory answered {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Deserialize)]
struct PeerList {
    peers: Vec<Peer>,
}

#[derive(Deserialize)]
struct History {
    transfers: Vec<TransferHistoryItem>,
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------
    // Transport helpers
    // ------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(resp.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.http.get(self.url(path)).send().await?;
        Self::decode(resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(resp).await
    }

    // ------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------

    /// Register (or refresh) this node.
    pub async fn register(&self, name: &str, address: &str, port: u16) -> Option<Peer> {
        let req = RegisterPeerRequest {
            name: name.to_string(),
            address: address.to_string(),
            port,
        };
        match self.post_json::<_, Peer>("/api/register", &req).await {
            Ok(peer) => {
                debug!(peer = %peer.name, "Registered with directory");
                Some(peer)
            }
            Err(e) => {
                warn!(peer = %name, error = %e, "Directory registration failed");
                None
            }
        }
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let req = UnregisterPeerRequest {
            name: name.to_string(),
        };
        match self.post_json::<_, StatusAck>("/api/unregister", &req).await {
            Ok(_) => true,
            Err(e) => {
                warn!(peer = %name, error = %e, "Directory unregistration failed");
                false
            }
        }
    }

    pub async fn list_peers(&self, online_only: bool) -> Vec<Peer> {
        let path = if online_only { "/api/peers/online" } else { "/api/peers" };
        match self.get_json::<PeerList>(path).await {
            Ok(list) => list.peers,
            Err(e) => {
                warn!(error = %e, "Peer listing failed");
                Vec::new()
            }
        }
    }

    pub async fn peer(&self, name: &str) -> Option<Peer> {
        match self.get_json::<Peer>(&format!("/api/peer/{name}")).await {
            Ok(peer) => Some(peer),
            Err(ClientError::Status { status, .. }) if status == StatusCode::NOT_FOUND => None,
            Err(e) => {
                warn!(peer = %name, error = %e, "Peer lookup failed");
                None
            }
        }
    }

    pub async fn status(&self) -> Option<ServiceStatus> {
        match self.get_json::<ServiceStatus>("/api/status").await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "Directory status unavailable");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Files and history
    // ------------------------------------------------------------------

    pub async fn file_register(&self, file: &NewFile) -> Option<i64> {
        match self.post_json::<_, FileRegistered>("/api/file/register", file).await {
            Ok(registered) => Some(registered.file_id),
            Err(e) => {
                warn!(file = %file.filename, error = %e, "File registration failed");
                None
            }
        }
    }

    pub async fn check_permission(&self, file_id: i64, peer_name: &str) -> bool {
        let req = CheckPermissionRequest {
            peer_name: peer_name.to_string(),
        };
        match self
            .post_json::<_, PermissionResponse>(&format!("/api/file/{file_id}/check"), &req)
            .await
        {
            Ok(resp) => resp.allowed,
            Err(e) => {
                warn!(file_id, peer = %peer_name, error = %e, "Permission check failed");
                false
            }
        }
    }

    pub async fn transfer_log(
        &self,
        file_id: i64,
        from: &str,
        to: &str,
        outcome: TransferOutcome,
    ) -> bool {
        let req = LogTransferRequest {
            file_id,
            from_peer: from.to_string(),
            to_peer: to.to_string(),
            outcome,
        };
        match self.post_json::<_, StatusAck>("/api/transfer/log", &req).await {
            Ok(_) => true,
            Err(e) => {
                warn!(file_id, to = %to, error = %e, "Transfer log failed");
                false
            }
        }
    }

    pub async fn sent_history(&self, peer: &str) -> Vec<TransferHistoryItem> {
        self.history("sent", peer).await
    }

    pub async fn received_history(&self, peer: &str) -> Vec<TransferHistoryItem> {
        self.history("received", peer).await
    }

    async fn history(&self, direction: &str, peer: &str) -> Vec<TransferHistoryItem> {
        match self
            .get_json::<History>(&format!("/api/files/{direction}/{peer}"))
            .await
        {
            Ok(history) => history.transfers,
            Err(e) => {
                warn!(peer = %peer, direction, error = %e, "History unavailable");
                Vec::new()
            }
        }
    }
}

impl Directory for DirectoryClient {
    async fn online_peers(&self) -> Vec<Peer> {
        self.list_peers(true).await
    }

    async fn get_peer(&self, name: &str) -> Option<Peer> {
        self.peer(name).await
    }

    async fn register_file(&self, file: &NewFile) -> Option<i64> {
        self.file_register(file).await
    }

    async fn log_transfer(&self, file_id: i64, from: &str, to: &str, outcome: TransferOutcome) -> bool {
        self.transfer_log(file_id, from, to, outcome).await
    }
}
