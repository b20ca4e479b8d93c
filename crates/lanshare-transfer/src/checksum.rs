use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use walkdir::WalkDir;

/// Hex BLAKE3 digest of a file, read in bounded chunks.
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Same as [`file_checksum`] but off the async runtime's worker threads.
pub async fn file_checksum_async(path: &Path) -> io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_checksum(&path))
        .await
        .map_err(io::Error::other)?
}

/// Total size in bytes and number of regular files below `dir`.
pub fn tree_size(dir: &Path) -> io::Result<(u64, usize)> {
    let mut bytes = 0u64;
    let mut files = 0usize;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            bytes += entry.metadata().map_err(io::Error::from)?.len();
            files += 1;
        }
    }
    Ok((bytes, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_matches_blake3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![42u8; 200_000];
        std::fs::write(&path, &data).unwrap();

        assert_eq!(
            file_checksum(&path).unwrap(),
            hex::encode(blake3::hash(&data).as_bytes())
        );
    }

    #[test]
    fn test_tree_size_counts_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.txt"), [0u8; 10]).unwrap();
        std::fs::write(dir.path().join("a/b/deep.txt"), [0u8; 32]).unwrap();

        assert_eq!(tree_size(dir.path()).unwrap(), (42, 2));
    }
}
