//! # lanshare-server
//!
//! Directory service for a lanshare network: peer presence, file records
//! with their permission grants, and the transfer history. File bytes never
//! pass through here; peers stream them to each other directly.
//!
//! [`DirectoryService`] is the async facade over the SQLite store and
//! [`api::build_router`] exposes it as HTTP/JSON.

pub mod api;
pub mod config;
pub mod directory;
pub mod error;

pub use api::{build_router, serve, serve_on, AppState};
pub use config::ServerConfig;
pub use directory::DirectoryService;
pub use error::{Result, ServerError};
