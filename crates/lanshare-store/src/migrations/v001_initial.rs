//! v001 -- Initial schema creation.
//!
//! Creates the four directory tables: `peers`, `files`, `permissions` and
//! `transfers`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Peers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS peers (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT UNIQUE NOT NULL,
    address    TEXT NOT NULL,
    port       INTEGER NOT NULL,
    status     TEXT NOT NULL DEFAULT 'online'
               CHECK (status IN ('online', 'offline')),
    last_seen  TEXT NOT NULL,                 -- RFC-3339
    created_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Files (metadata only, never content)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS files (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    filename   TEXT NOT NULL,
    size       INTEGER NOT NULL,
    checksum   TEXT NOT NULL,                 -- hex BLAKE3 or 'folder'
    owner      TEXT NOT NULL,
    visibility TEXT NOT NULL
               CHECK (visibility IN ('private', 'shared', 'public')),
    created_at TEXT NOT NULL,

    FOREIGN KEY (owner) REFERENCES peers(name)
);

-- ----------------------------------------------------------------
-- Permission grants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS permissions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id    INTEGER NOT NULL,
    peer_name  TEXT NOT NULL,
    granted_at TEXT NOT NULL,

    UNIQUE (file_id, peer_name),
    FOREIGN KEY (file_id) REFERENCES files(id)
);

-- ----------------------------------------------------------------
-- Transfer log (append-only; peers are not foreign keys so history
-- survives a peer disappearing)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS transfers (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id        INTEGER NOT NULL,
    from_peer      TEXT NOT NULL,
    to_peer        TEXT NOT NULL,
    outcome        TEXT NOT NULL
                   CHECK (outcome IN ('success', 'failed')),
    transferred_at TEXT NOT NULL,

    FOREIGN KEY (file_id) REFERENCES files(id)
);

CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_peer);
CREATE INDEX IF NOT EXISTS idx_transfers_to   ON transfers(to_peer);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
