//! Sink reconciler: drains the durable buffer into the remote sink.
//!
//! Runs on its own cadence, independent of the sampler. Each cycle lists
//! the undelivered entries, attempts delivery oldest-first, and marks an
//! entry delivered only on confirmed success. One failing entry never
//! blocks the rest. On cycles where nothing could be delivered the cadence
//! backs off exponentially up to a cap, and snaps back to the base
//! interval after the first success.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::buffer::{BufferError, BufferStore, Payload};
use crate::sink::{outage_row, sample_row, Sink, Table};

/// Result of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Reconciler {
    buffer: Arc<dyn BufferStore>,
    sink: Arc<dyn Sink>,
    base_interval: Duration,
    backoff_cap: Duration,
    provisioned: bool,
    consecutive_failures: u32,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("base_interval", &self.base_interval)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        buffer: Arc<dyn BufferStore>,
        sink: Arc<dyn Sink>,
        base_interval: Duration,
        backoff_cap: Duration,
    ) -> Self {
        Self {
            buffer,
            sink,
            base_interval,
            backoff_cap,
            provisioned: false,
            consecutive_failures: 0,
        }
    }

    /// Interval to wait before the next cycle, after backoff.
    pub fn next_interval(&self) -> Duration {
        let shift = self.consecutive_failures.min(16);
        let backed_off = self
            .base_interval
            .checked_mul(1u32 << shift)
            .unwrap_or(self.backoff_cap);
        backed_off.min(self.backoff_cap)
    }

    /// Run one drain cycle.
    ///
    /// Buffer read errors bubble up; the caller retries next cycle. Sink
    /// errors are absorbed into the outcome.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, BufferError> {
        if !self.provisioned {
            match self.sink.ensure_tables().await {
                Ok(()) => {
                    self.provisioned = true;
                    tracing::info!("Sink tables provisioned");
                }
                Err(e) => {
                    self.log_sink_failure(&e, "Sink provisioning failed");
                    self.consecutive_failures += 1;
                    return Ok(CycleOutcome {
                        delivered: 0,
                        failed: 1,
                    });
                }
            }
        }

        let entries = self.buffer.list_undelivered()?;
        if entries.is_empty() {
            return Ok(CycleOutcome::default());
        }
        tracing::debug!(pending = entries.len(), "Reconciling buffered entries");

        let mut outcome = CycleOutcome::default();
        for entry in entries {
            self.buffer.note_attempt(entry.id, Utc::now())?;

            let result = match &entry.payload {
                Payload::Sample(sample) => {
                    self.sink
                        .append_row(Table::ConnectivityChecks, sample_row(sample))
                        .await
                }
                Payload::Outage(event) => {
                    self.sink
                        .upsert_outage_row(&event.location_id, event.start_time, outage_row(event))
                        .await
                }
            };

            match result {
                Ok(()) => {
                    self.buffer.mark_delivered(entry.id)?;
                    outcome.delivered += 1;
                }
                Err(e) => {
                    // Leave undelivered and keep going; later entries may
                    // hit a different failure (or none).
                    self.log_sink_failure(&e, "Delivery attempt failed");
                    outcome.failed += 1;
                }
            }
        }

        if outcome.delivered > 0 {
            self.consecutive_failures = 0;
        } else if outcome.failed > 0 {
            self.consecutive_failures += 1;
        }

        if outcome.delivered > 0 || outcome.failed > 0 {
            tracing::info!(
                delivered = outcome.delivered,
                failed = outcome.failed,
                pending = self.buffer.pending(),
                "Reconcile cycle finished"
            );
        }
        Ok(outcome)
    }

    fn log_sink_failure(&self, error: &crate::sink::SinkError, context: &str) {
        if error.is_auth() {
            tracing::error!(
                error = %error,
                pending = self.buffer.pending(),
                "{context}; buffered entries cannot be delivered until credentials are fixed"
            );
        } else {
            tracing::warn!(error = %error, "{context}");
        }
    }

    /// Periodic drain loop. On shutdown, runs one final best-effort cycle.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let wait = self.next_interval();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Reconciler stopping; final delivery attempt");
                        if let Err(e) = self.run_cycle().await {
                            tracing::warn!(error = %e, "Final reconcile cycle failed");
                        }
                        return;
                    }
                    continue;
                }
            }

            if let Err(e) = self.run_cycle().await {
                tracing::warn!(error = %e, "Reconcile cycle failed; will retry");
            }
        }
    }
}
