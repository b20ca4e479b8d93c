//! Async facade over the directory store.
//!
//! Each method is exactly one store operation, run on the blocking pool.
//! Atomicity comes from the store's per-operation transactions; the mutex
//! only serializes access to the single SQLite connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use lanshare_store::{
    Database, FileRecord, NewFile, Peer, TransferHistoryItem, TransferLogEntry,
};
use lanshare_shared::TransferOutcome;

use crate::error::{Result, ServerError};

#[derive(Clone)]
pub struct DirectoryService {
    db: Arc<Mutex<Database>>,
    max_file_size: u64,
}

impl DirectoryService {
    pub fn new(db: Database, max_file_size: u64) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            max_file_size,
        }
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, max_file_size: u64) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?, max_file_size))
    }

    async fn with_db<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Database) -> lanshare_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
            op(&guard).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("store task failed: {e}")))?
    }

    // ------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------

    pub async fn register(&self, name: String, address: String, port: u16) -> Result<Peer> {
        self.with_db(move |db| db.register_peer(&name, &address, port))
            .await
    }

    /// Mark a peer offline. Unknown names are `NotFound`.
    pub async fn unregister(&self, name: String) -> Result<()> {
        let known = self
            .with_db({
                let name = name.clone();
                move |db| db.unregister_peer(&name)
            })
            .await?;
        if known {
            Ok(())
        } else {
            Err(ServerError::NotFound(format!("peer {name}")))
        }
    }

    pub async fn list_peers(&self, online_only: bool) -> Result<Vec<Peer>> {
        self.with_db(move |db| db.list_peers(online_only)).await
    }

    pub async fn get_peer(&self, name: String) -> Result<Option<Peer>> {
        self.with_db(move |db| db.get_peer(&name)).await
    }

    /// `(total, online)`.
    pub async fn peer_counts(&self) -> Result<(u64, u64)> {
        self.with_db(|db| db.peer_counts()).await
    }

    // ------------------------------------------------------------------
    // Files and permissions
    // ------------------------------------------------------------------

    /// Register a file with its grants. Declared sizes above the configured
    /// limit are rejected before touching the store.
    pub async fn register_file(&self, file: NewFile) -> Result<i64> {
        if file.size > self.max_file_size {
            return Err(ServerError::FileTooLarge {
                size: file.size,
                max: self.max_file_size,
            });
        }
        self.with_db(move |db| db.register_file(&file)).await
    }

    pub async fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        self.with_db(move |db| db.get_file(id)).await
    }

    pub async fn check_permission(&self, file_id: i64, peer_name: String) -> Result<bool> {
        self.with_db(move |db| db.check_permission(file_id, &peer_name))
            .await
    }

    // ------------------------------------------------------------------
    // Transfer log
    // ------------------------------------------------------------------

    pub async fn log_transfer(
        &self,
        file_id: i64,
        from: String,
        to: String,
        outcome: TransferOutcome,
    ) -> Result<TransferLogEntry> {
        self.with_db(move |db| db.log_transfer(file_id, &from, &to, outcome))
            .await
    }

    pub async fn sent_history(&self, peer: String) -> Result<Vec<TransferHistoryItem>> {
        self.with_db(move |db| db.sent_transfers(&peer)).await
    }

    pub async fn received_history(&self, peer: String) -> Result<Vec<TransferHistoryItem>> {
        self.with_db(move |db| db.received_transfers(&peer)).await
    }
}
