//! Durable buffer for samples and outage events awaiting delivery.
//!
//! The buffer is the crash-safety boundary of the pipeline: every emitted
//! sample and outage event is persisted here before anything attempts to
//! reach the remote sink, and nothing is purged until the reconciler has
//! confirmed delivery. [`file::FileBuffer`] is the production journal;
//! [`memory::MemoryBuffer`] backs tests.

pub mod file;
pub mod memory;

pub use file::FileBuffer;
pub use memory::MemoryBuffer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outage::OutageEvent;
use crate::sample::Sample;

/// Errors that can occur in the buffer layer.
///
/// An `append` failure is the one failure mode the buffer exists to
/// prevent from passing silently; callers treat it as fatal.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Journal I/O failed.
    #[error("buffer I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal record could not be encoded.
    #[error("buffer encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Payload carried by one buffer entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Sample(Sample),
    Outage(OutageEvent),
}

/// A payload plus its delivery metadata.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    /// Monotonic sequence number; also the emission order.
    pub id: u64,
    pub payload: Payload,
    pub delivered: bool,
    pub attempt_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Storage contract between the sampler and the reconciler.
///
/// `append` must be durable before it returns. `mark_delivered` is
/// idempotent: marking an already-delivered (or compacted-away) entry is a
/// no-op. Implementations are safe for concurrent use by one appending
/// writer and one reconciling reader.
pub trait BufferStore: Send + Sync {
    /// Persist a new entry; returns its sequence number.
    fn append(&self, payload: Payload) -> Result<u64, BufferError>;

    /// Snapshot of undelivered entries in emission order.
    fn list_undelivered(&self) -> Result<Vec<BufferEntry>, BufferError>;

    /// Mark an entry delivered. Idempotent.
    fn mark_delivered(&self, id: u64) -> Result<(), BufferError>;

    /// Record a delivery attempt against an entry.
    fn note_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<(), BufferError>;

    /// Number of entries still awaiting delivery.
    fn pending(&self) -> usize;
}
