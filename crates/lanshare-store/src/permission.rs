//! Access decisions for file records.
//!
//! Pure logic: callers load the record and its grants, this module decides.

use lanshare_shared::Visibility;

use crate::models::{FileRecord, PermissionGrant};

/// Decide whether `requester` may access `file`.
///
/// The owner is always authorized, then every peer for `public` files,
/// otherwise only peers holding a grant for this file. A missing record is
/// never authorized.
pub fn is_authorized(file: Option<&FileRecord>, grants: &[PermissionGrant], requester: &str) -> bool {
    let Some(file) = file else {
        return false;
    };

    if file.owner == requester {
        return true;
    }

    if file.visibility == Visibility::Public {
        return true;
    }

    grants
        .iter()
        .any(|g| g.file_id == file.id && g.peer_name == requester)
}
