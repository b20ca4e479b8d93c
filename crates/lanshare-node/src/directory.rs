//! The directory calls the share flow depends on.
//!
//! Implementations never fail outright: an unreachable directory looks like
//! an empty or negative answer, and the implementation logs the cause.

use lanshare_shared::TransferOutcome;
use lanshare_store::{NewFile, Peer};

#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Online peers, ordered by name.
    async fn online_peers(&self) -> Vec<Peer>;

    async fn get_peer(&self, name: &str) -> Option<Peer>;

    /// Id of the new file record, or `None` when the directory refused it.
    async fn register_file(&self, file: &NewFile) -> Option<i64>;

    /// Whether the entry was recorded.
    async fn log_transfer(&self, file_id: i64, from: &str, to: &str, outcome: TransferOutcome) -> bool;
}
