use std::io;
use std::path::Path;

use serde::Serialize;

use crate::checksum::tree_size;
use crate::receiver::PARTIAL_PREFIX;

/// One stored item in a receiver's storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub name: String,
    pub is_directory: bool,
    /// File length, or total bytes below a directory.
    pub size: u64,
}

/// Items in `storage_dir`, sorted by name. In-progress transfers are
/// skipped; a missing directory is simply empty.
pub fn list_received(storage_dir: &Path) -> io::Result<Vec<InboxEntry>> {
    let entries = match std::fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(PARTIAL_PREFIX) {
            continue;
        }

        let file_type = entry.file_type()?;
        let (is_directory, size) = if file_type.is_dir() {
            (true, tree_size(&entry.path())?.0)
        } else if file_type.is_file() {
            (false, entry.metadata()?.len())
        } else {
            continue;
        };
        items.push(InboxEntry {
            name,
            is_directory,
            size,
        });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}
