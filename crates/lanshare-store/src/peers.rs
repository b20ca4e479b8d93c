//! Peer registration and discovery.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use lanshare_shared::PeerStatus;

use crate::database::{parsed_at, timestamp_at, Database};
use crate::error::{Result, StoreError};
use crate::models::Peer;

const PEER_COLUMNS: &str = "name, address, port, status, last_seen, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Register a peer, or refresh it if the name is already known.
    ///
    /// A known name is updated in place (address, port, status back to
    /// online, last-seen); a new name is inserted. Both branches run in one
    /// transaction, so a name never yields two rows.
    pub fn register_peer(&self, name: &str, address: &str, port: u16) -> Result<Peer> {
        if name.trim().is_empty() || address.trim().is_empty() || port == 0 {
            return Err(StoreError::Invalid("name, address and port are required".into()));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn().unchecked_transaction()?;

        if Self::peer_exists(&tx, name)? {
            tx.execute(
                "UPDATE peers
                 SET address = ?2, port = ?3, status = 'online', last_seen = ?4
                 WHERE name = ?1",
                params![name, address, port, now],
            )?;
            tracing::debug!(peer = %name, address = %address, port, "peer refreshed");
        } else {
            tx.execute(
                "INSERT INTO peers (name, address, port, status, last_seen, created_at)
                 VALUES (?1, ?2, ?3, 'online', ?4, ?4)",
                params![name, address, port, now],
            )?;
            tracing::info!(peer = %name, address = %address, port, "peer registered");
        }

        let peer = tx.query_row(
            &format!("SELECT {PEER_COLUMNS} FROM peers WHERE name = ?1"),
            params![name],
            row_to_peer,
        )?;
        tx.commit()?;
        Ok(peer)
    }

    /// Mark a peer offline. The row is kept. Returns `false` for unknown names.
    pub fn unregister_peer(&self, name: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE peers SET status = 'offline' WHERE name = ?1",
            params![name],
        )?;
        if affected > 0 {
            tracing::info!(peer = %name, "peer went offline");
        }
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List peers ordered by name, optionally only those online.
    pub fn list_peers(&self, online_only: bool) -> Result<Vec<Peer>> {
        let sql = if online_only {
            format!("SELECT {PEER_COLUMNS} FROM peers WHERE status = 'online' ORDER BY name ASC")
        } else {
            format!("SELECT {PEER_COLUMNS} FROM peers ORDER BY name ASC")
        };

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_peer)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Look a peer up by name. Unknown names are `Ok(None)`.
    pub fn get_peer(&self, name: &str) -> Result<Option<Peer>> {
        let peer = self
            .conn()
            .query_row(
                &format!("SELECT {PEER_COLUMNS} FROM peers WHERE name = ?1"),
                params![name],
                row_to_peer,
            )
            .optional()?;
        Ok(peer)
    }

    pub(crate) fn peer_exists(conn: &rusqlite::Connection, name: &str) -> Result<bool> {
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM peers WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// `(total, online)` peer counts.
    pub fn peer_counts(&self) -> Result<(u64, u64)> {
        let counts = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(status = 'online'), 0) FROM peers",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )?;
        Ok(counts)
    }
}

fn row_to_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Peer> {
    Ok(Peer {
        name: row.get(0)?,
        address: row.get(1)?,
        port: row.get(2)?,
        status: parsed_at::<PeerStatus>(row, 3)?,
        last_seen: timestamp_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
    })
}
