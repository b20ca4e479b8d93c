//! Peer-to-peer byte path over plain TCP.
//!
//! A transfer is one connection carrying a handshake frame, a 2-byte
//! acknowledgement and exactly the announced number of payload bytes.
//! Directories travel as deterministic tar archives and are unpacked on
//! arrival.

pub mod archive;
pub mod checksum;
pub mod error;
pub mod inbox;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use archive::{pack_directory, unpack_archive, ArchiveError, UnpackSummary};
pub use checksum::{file_checksum, file_checksum_async, tree_size};
pub use error::{TransferError, TransferStep};
pub use inbox::{list_received, InboxEntry};
pub use receiver::{ReceivedItem, ReceiverConfig, ReceiverHandle, TransferReceiver};
pub use sender::{SendReport, SenderConfig, TransferSender};
