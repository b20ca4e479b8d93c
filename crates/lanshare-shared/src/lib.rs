//! # lanshare-shared
//!
//! Vocabulary shared by every lanshare crate: the domain enums stored by the
//! directory, the handshake frame exchanged between peers, and protocol
//! constants.

pub mod api;
pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::Handshake;
pub use types::{ItemKind, PeerStatus, TransferOutcome, Visibility};
