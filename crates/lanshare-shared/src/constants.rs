/// Acknowledgement token written by the receiver once a handshake is accepted.
pub const ACK_TOKEN: &[u8; 2] = b"OK";

/// Width of the big-endian length header that precedes a handshake body.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Upper bound for a handshake body in bytes (4 KiB).
pub const MAX_HANDSHAKE_LEN: usize = 4096;

/// Maximum item name length in bytes.
pub const MAX_ITEM_NAME_LEN: usize = 255;

/// Suffix appended to a directory name when it travels as an archive.
pub const ARCHIVE_SUFFIX: &str = ".tar";

/// Checksum recorded for directory transfers, which have no single content hash.
pub const FOLDER_CHECKSUM: &str = "folder";

/// Default payload chunk size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default TCP port a node's receiver listens on.
pub const DEFAULT_RECEIVER_PORT: u16 = 5001;

/// Default HTTP port of the directory service.
pub const DEFAULT_DIRECTORY_PORT: u16 = 5000;

/// Default limit on simultaneously handled inbound transfers.
pub const DEFAULT_MAX_TRANSFERS: usize = 16;

/// Default directory-service request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Maximum declared file size accepted by the directory (1 GiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Seconds a receiver waits for the handshake of a newly accepted connection.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 5;
