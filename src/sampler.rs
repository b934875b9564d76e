//! Sampler: runs the probe set on a fixed cadence and emits samples.
//!
//! Each tick runs the three probes concurrently, aggregates them into one
//! [`Sample`] through the quorum rule, and hands the sample to both the
//! durable buffer and the outage tracker. A probe timeout only degrades
//! that probe's outcome; a buffer append failure is fatal and ends the
//! sampling loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::buffer::{BufferError, BufferStore, Payload};
use crate::outage::OutageTracker;
use crate::probe::{ProbeReport, Prober};
use crate::sample::{QuorumRule, Sample};

pub struct Sampler<P: Prober> {
    location_id: String,
    rule: QuorumRule,
    prober: P,
    buffer: Arc<dyn BufferStore>,
    tracker: OutageTracker,
}

impl<P: Prober> std::fmt::Debug for Sampler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("location_id", &self.location_id)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

impl<P: Prober> Sampler<P> {
    pub fn new(
        location_id: impl Into<String>,
        rule: QuorumRule,
        prober: P,
        buffer: Arc<dyn BufferStore>,
    ) -> Self {
        let location_id = location_id.into();
        let tracker = OutageTracker::new(location_id.clone());
        Self {
            location_id,
            rule,
            prober,
            buffer,
            tracker,
        }
    }

    /// Run one tick: probe, aggregate, persist, track.
    ///
    /// The sample is appended to the buffer and fed to the tracker in one
    /// call so both observe every emitted sample.
    pub async fn tick(&mut self) -> Result<Sample, BufferError> {
        let (ping, dns, http) =
            tokio::join!(self.prober.ping(), self.prober.dns(), self.prober.http());

        let sample = self.build_sample(&ping, &dns, &http);
        self.buffer.append(Payload::Sample(sample.clone()))?;

        if let Some(event) = self.tracker.observe(&sample) {
            self.buffer.append(Payload::Outage(event))?;
        }

        tracing::info!(
            location = %self.location_id,
            connected = sample.connected,
            ping = sample.ping.as_ref(),
            dns = sample.dns.as_ref(),
            http = sample.http.as_ref(),
            pending = self.buffer.pending(),
            "Check completed"
        );
        Ok(sample)
    }

    fn build_sample(&self, ping: &ProbeReport, dns: &ProbeReport, http: &ProbeReport) -> Sample {
        let connected = self.rule.connected(ping.status, dns.status, http.status);
        let avg_ping_ms = if ping.status.is_success() {
            ping.avg_latency_ms
        } else {
            None
        };

        Sample {
            timestamp: Utc::now(),
            location_id: self.location_id.clone(),
            ping: ping.status,
            dns: dns.status,
            http: http.status,
            avg_ping_ms,
            connected,
            notes: build_notes(ping, http, dns),
        }
    }

    /// Tick loop on a fixed interval; the first tick fires immediately.
    ///
    /// Returns an error only on buffer durability failure, which callers
    /// treat as fatal to the process.
    pub async fn run(
        mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BufferError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(location = %self.location_id, "Sampler stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Summarize failed probes, listing the targets that did not answer.
fn build_notes(ping: &ProbeReport, http: &ProbeReport, dns: &ProbeReport) -> String {
    let mut notes = Vec::new();
    for (name, report) in [("Ping", ping), ("HTTP", http), ("DNS", dns)] {
        if !report.failed_targets.is_empty() {
            notes.push(format!(
                "{} failed: {}",
                name,
                report.failed_targets.join(", ")
            ));
        }
    }
    if notes.is_empty() {
        "All tests passed".to_string()
    } else {
        notes.join("; ")
    }
}
