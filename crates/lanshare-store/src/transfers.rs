//! Append-only transfer log.

use chrono::Utc;
use rusqlite::params;

use lanshare_shared::TransferOutcome;

use crate::database::{parsed_at, size_at, timestamp_at, Database};
use crate::error::{Result, StoreError};
use crate::models::{TransferHistoryItem, TransferLogEntry};

const HISTORY_SELECT: &str = "SELECT t.id, t.file_id, t.from_peer, t.to_peer, t.outcome, t.transferred_at,
        f.filename, f.size
 FROM transfers t
 JOIN files f ON f.id = t.file_id";

impl Database {
    /// Append one delivery attempt. `from`/`to` are not checked against the
    /// peer table; the file id must exist.
    pub fn log_transfer(
        &self,
        file_id: i64,
        from: &str,
        to: &str,
        outcome: TransferOutcome,
    ) -> Result<TransferLogEntry> {
        let now = Utc::now();
        let tx = self.conn().unchecked_transaction()?;

        let known: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM files WHERE id = ?1)",
            params![file_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(StoreError::UnknownFile(file_id));
        }

        tx.execute(
            "INSERT INTO transfers (file_id, from_peer, to_peer, outcome, transferred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![file_id, from, to, outcome.as_str(), now.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(file_id, from = %from, to = %to, outcome = %outcome, "transfer logged");

        Ok(TransferLogEntry {
            id,
            file_id,
            from_peer: from.to_string(),
            to_peer: to.to_string(),
            outcome,
            transferred_at: now,
        })
    }

    /// Every attempt recorded for one file, oldest first.
    pub fn transfers_for_file(&self, file_id: i64) -> Result<Vec<TransferLogEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, file_id, from_peer, to_peer, outcome, transferred_at
             FROM transfers
             WHERE file_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![file_id], row_to_entry)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Transfers sent by `peer`, newest first.
    pub fn sent_transfers(&self, peer: &str) -> Result<Vec<TransferHistoryItem>> {
        self.history(&format!("{HISTORY_SELECT} WHERE t.from_peer = ?1 ORDER BY t.id DESC"), peer)
    }

    /// Transfers addressed to `peer`, newest first.
    pub fn received_transfers(&self, peer: &str) -> Result<Vec<TransferHistoryItem>> {
        self.history(&format!("{HISTORY_SELECT} WHERE t.to_peer = ?1 ORDER BY t.id DESC"), peer)
    }

    fn history(&self, sql: &str, peer: &str) -> Result<Vec<TransferHistoryItem>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![peer], |row| {
            Ok(TransferHistoryItem {
                entry: row_to_entry(row)?,
                filename: row.get(6)?,
                size: size_at(row, 7)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransferLogEntry> {
    Ok(TransferLogEntry {
        id: row.get(0)?,
        file_id: row.get(1)?,
        from_peer: row.get(2)?,
        to_peer: row.get(3)?,
        outcome: parsed_at::<TransferOutcome>(row, 4)?,
        transferred_at: timestamp_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use lanshare_shared::Visibility;

    use super::*;
    use crate::models::NewFile;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        for name in ["alice", "bob", "carol"] {
            db.register_peer(name, "127.0.0.1", 5001).unwrap();
        }
        let id = db
            .register_file(&NewFile {
                filename: "notes.txt".into(),
                size: 12,
                checksum: "00".into(),
                owner: "alice".into(),
                visibility: Visibility::Shared,
                recipients: vec!["bob".into(), "carol".into()],
            })
            .unwrap();
        (db, id)
    }

    #[test]
    fn test_log_and_history() {
        let (db, id) = setup();
        db.log_transfer(id, "alice", "bob", TransferOutcome::Success).unwrap();
        db.log_transfer(id, "alice", "carol", TransferOutcome::Failed).unwrap();

        let sent = db.sent_transfers("alice").unwrap();
        assert_eq!(sent.len(), 2);
        // newest first
        assert_eq!(sent[0].entry.to_peer, "carol");
        assert_eq!(sent[0].filename, "notes.txt");

        let received = db.received_transfers("bob").unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].entry.outcome, TransferOutcome::Success);
    }

    #[test]
    fn test_log_accepts_unknown_peers() {
        let (db, id) = setup();
        db.log_transfer(id, "alice", "long-gone", TransferOutcome::Failed).unwrap();
        assert_eq!(db.transfers_for_file(id).unwrap().len(), 1);
    }

    #[test]
    fn test_log_rejects_unknown_file() {
        let (db, _) = setup();
        let err = db
            .log_transfer(999, "alice", "bob", TransferOutcome::Success)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownFile(999)));
    }

    #[test]
    fn test_history_survives_peer_going_offline() {
        let (db, id) = setup();
        db.log_transfer(id, "alice", "bob", TransferOutcome::Success).unwrap();
        db.unregister_peer("bob").unwrap();
        assert_eq!(db.received_transfers("bob").unwrap().len(), 1);
    }
}
