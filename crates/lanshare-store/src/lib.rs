//! # lanshare-store
//!
//! SQLite-backed registry for the lanshare directory service.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and owns the four directory tables: peers, file
//! records, permission grants and the append-only transfer log. Every
//! mutating helper runs as a single transaction so concurrent callers never
//! observe half-applied state.

pub mod database;
pub mod files;
pub mod migrations;
pub mod models;
pub mod peers;
pub mod permission;
pub mod transfers;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use permission::is_authorized;
