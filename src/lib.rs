//! Netpulse - Internet Connectivity Monitor
//!
//! This crate provides the core functionality of the netpulse connectivity
//! monitor. It can be used as a library by other Rust projects, or run as a
//! standalone binary with the `netpulse` executable.
//!
//! # Architecture
//!
//! - **Probes**: Ping, DNS, and HTTP reachability checks against multiple targets
//! - **Sampler**: Periodic probe runs aggregated into connectivity samples
//! - **Outage tracker**: UP/DOWN state machine emitting outage events
//! - **Durable buffer**: Crash-safe local journal decoupling sampling from delivery
//! - **Reconciler**: Drains the buffer to a remote tabular sink with retry and backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use netpulse::{
//!     buffer::{BufferStore, FileBuffer},
//!     config::MonitorConfig,
//!     probe::NetProber,
//!     sampler::Sampler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::load("netpulse.yaml")?;
//!     let buffer: Arc<dyn BufferStore> = Arc::new(FileBuffer::open(&config.buffer.path)?);
//!     let prober = NetProber::new(config.probes.clone())?;
//!     let mut sampler = Sampler::new(config.location_id, config.quorum, prober, buffer);
//!     sampler.tick().await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod outage;
pub mod probe;
pub mod reconciler;
pub mod sample;
pub mod sampler;
pub mod sink;

pub use buffer::{BufferEntry, BufferError, BufferStore, FileBuffer, MemoryBuffer, Payload};
pub use config::{ConfigError, MonitorConfig};
pub use outage::{OutageEvent, OutageStatus, OutageTracker};
pub use probe::{NetProber, ProbeReport, Prober};
pub use reconciler::Reconciler;
pub use sample::{ProbeStatus, QuorumRule, Sample};
pub use sampler::Sampler;
pub use sink::{SheetsSink, Sink, SinkError, Table};
