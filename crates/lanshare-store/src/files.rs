//! File records, permission grants and access checks.

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use lanshare_shared::Visibility;

use crate::database::{parsed_at, size_at, timestamp_at, Database};
use crate::error::{Result, StoreError};
use crate::models::{FileRecord, NewFile, PermissionGrant};
use crate::permission::is_authorized;

impl Database {
    /// Register a file and its grants, returning the new file id.
    ///
    /// The owner must be a known peer. For non-public files every recipient
    /// must be a known peer too; the first unknown one is reported. Public
    /// files ignore `recipients`. Nothing is written unless every check
    /// passes.
    pub fn register_file(&self, file: &NewFile) -> Result<i64> {
        if file.filename.trim().is_empty() {
            return Err(StoreError::Invalid("filename is required".into()));
        }
        let size = i64::try_from(file.size)
            .map_err(|_| StoreError::Invalid(format!("size {} out of range", file.size)))?;

        let tx = self.conn().unchecked_transaction()?;

        if !Self::peer_exists(&tx, &file.owner)? {
            return Err(StoreError::UnknownOwner(file.owner.clone()));
        }

        // Duplicates collapse to one grant each.
        let grantees: BTreeSet<&str> = match file.visibility {
            Visibility::Public => BTreeSet::new(),
            Visibility::Private | Visibility::Shared => {
                file.recipients.iter().map(String::as_str).collect()
            }
        };
        for name in &grantees {
            if !Self::peer_exists(&tx, name)? {
                return Err(StoreError::UnknownRecipient((*name).to_string()));
            }
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO files (filename, size, checksum, owner, visibility, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.filename,
                size,
                file.checksum,
                file.owner,
                file.visibility.as_str(),
                now,
            ],
        )?;
        let file_id = tx.last_insert_rowid();

        for name in &grantees {
            tx.execute(
                "INSERT INTO permissions (file_id, peer_name, granted_at) VALUES (?1, ?2, ?3)",
                params![file_id, name, now],
            )?;
        }

        tx.commit()?;

        tracing::info!(
            file_id,
            filename = %file.filename,
            owner = %file.owner,
            visibility = %file.visibility,
            grants = grantees.len(),
            "file registered"
        );
        Ok(file_id)
    }

    /// Fetch a file record. Unknown ids are `Ok(None)`.
    pub fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        let file = self
            .conn()
            .query_row(
                "SELECT id, filename, size, checksum, owner, visibility, created_at
                 FROM files
                 WHERE id = ?1",
                params![id],
                row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    /// All grants for a file, ordered by grantee name.
    pub fn grants_for_file(&self, file_id: i64) -> Result<Vec<PermissionGrant>> {
        let mut stmt = self.conn().prepare(
            "SELECT file_id, peer_name, granted_at
             FROM permissions
             WHERE file_id = ?1
             ORDER BY peer_name ASC",
        )?;

        let rows = stmt.query_map(params![file_id], |row| {
            Ok(PermissionGrant {
                file_id: row.get(0)?,
                peer_name: row.get(1)?,
                granted_at: timestamp_at(row, 2)?,
            })
        })?;

        let mut grants = Vec::new();
        for row in rows {
            grants.push(row?);
        }
        Ok(grants)
    }

    /// Whether `peer_name` may access file `file_id`. Unknown ids are denied.
    pub fn check_permission(&self, file_id: i64, peer_name: &str) -> Result<bool> {
        let file = self.get_file(file_id)?;
        let grants = match &file {
            Some(_) => self.grants_for_file(file_id)?,
            None => Vec::new(),
        };

        Ok(is_authorized(file.as_ref(), &grants, peer_name))
    }
}

pub(crate) fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        size: size_at(row, 2)?,
        checksum: row.get(3)?,
        owner: row.get(4)?,
        visibility: parsed_at::<Visibility>(row, 5)?,
        created_at: timestamp_at(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_peers(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.register_peer(name, "127.0.0.1", 5001).unwrap();
        }
        db
    }

    fn new_file(owner: &str, visibility: Visibility, recipients: &[&str]) -> NewFile {
        NewFile {
            filename: "report.pdf".into(),
            size: 10_000,
            checksum: "deadbeef".into(),
            owner: owner.into(),
            visibility,
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_private_file_grants_recipient_only() {
        let db = db_with_peers(&["alice", "bob", "carol"]);
        let id = db
            .register_file(&new_file("alice", Visibility::Private, &["bob"]))
            .unwrap();

        assert!(db.check_permission(id, "alice").unwrap());
        assert!(db.check_permission(id, "bob").unwrap());
        assert!(!db.check_permission(id, "carol").unwrap());
        assert!(!db.check_permission(id, "stranger").unwrap());
    }

    #[test]
    fn test_shared_file_grants_exact_set() {
        let db = db_with_peers(&["alice", "bob", "carol", "dave"]);
        let id = db
            .register_file(&new_file("alice", Visibility::Shared, &["bob", "carol", "bob"]))
            .unwrap();

        let grantees: Vec<_> = db
            .grants_for_file(id)
            .unwrap()
            .into_iter()
            .map(|g| g.peer_name)
            .collect();
        assert_eq!(grantees, ["bob", "carol"]);
        assert!(!db.check_permission(id, "dave").unwrap());
    }

    #[test]
    fn test_public_file_ignores_recipients() {
        let db = db_with_peers(&["alice", "bob", "carol"]);
        let id = db
            .register_file(&new_file("alice", Visibility::Public, &["nobody-known"]))
            .unwrap();

        assert!(db.grants_for_file(id).unwrap().is_empty());
        for peer in ["bob", "carol", "unregistered"] {
            assert!(db.check_permission(id, peer).unwrap());
        }
    }

    #[test]
    fn test_unknown_owner_rejected() {
        let db = db_with_peers(&["bob"]);
        let err = db
            .register_file(&new_file("alice", Visibility::Private, &["bob"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownOwner(ref n) if n == "alice"));
    }

    #[test]
    fn test_unknown_recipient_rejected_without_partial_state() {
        let db = db_with_peers(&["alice", "bob"]);
        let err = db
            .register_file(&new_file("alice", Visibility::Shared, &["bob", "zed"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRecipient(ref n) if n == "zed"));
        assert!(err.is_validation());

        let files: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        let grants: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM permissions", [], |r| r.get(0))
            .unwrap();
        assert_eq!((files, grants), (0, 0));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let db = db_with_peers(&["alice"]);
        let a = db.register_file(&new_file("alice", Visibility::Public, &[])).unwrap();
        let b = db.register_file(&new_file("alice", Visibility::Public, &[])).unwrap();
        assert!(b > a);

        let record = db.get_file(b).unwrap().unwrap();
        assert_eq!(record.size, 10_000);
        assert_eq!(record.visibility, Visibility::Public);
    }

    #[test]
    fn test_unknown_file_denied() {
        let db = db_with_peers(&["alice"]);
        assert!(db.get_file(42).unwrap().is_none());
        assert!(!db.check_permission(42, "alice").unwrap());
    }

    #[test]
    fn test_empty_filename_rejected() {
        let db = db_with_peers(&["alice"]);
        let mut file = new_file("alice", Visibility::Public, &[]);
        file.filename = "  ".into();
        assert!(matches!(db.register_file(&file), Err(StoreError::Invalid(_))));
    }
}
