//! # lanshare-node
//!
//! Everything a peer runs: the directory client, the share flow that fans a
//! file out to recipients, and the configuration for the local receiver.

pub mod config;
pub mod directory;
pub mod directory_client;
pub mod share;

pub use config::NodeConfig;
pub use directory::Directory;
pub use directory_client::DirectoryClient;
pub use share::{share, RecipientOutcome, Recipients, ShareError, ShareReport};
