//!  Storage is organized through [usage_store::JsonUsageStore].
//!  The basic idea is:
//!   - There is an application directory holding one JSON document with all the counters.
//!   - Counters are grouped by local day and then by hostname.
//!   - The document is replaced as a whole on every write, so readers never see a partial write.

use std::io;

use thiserror::Error;

pub mod classifications;
pub mod entities;
#[cfg(test)]
pub mod memory;
pub mod usage_store;

/// Failures of the durable store. None of them are fatal for tracking, the affected interval is
/// simply not recorded.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to lock store: {0}")]
    Lock(#[source] io::Error),
    #[error("failed to read store: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write store: {0}")]
    Write(#[source] io::Error),
    #[error("store contains invalid json: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("failed to encode store contents: {0}")]
    Encode(#[source] serde_json::Error),
}
