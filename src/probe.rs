//! Reachability probes (ping, DNS, HTTP).
//!
//! Each probe kind tests a list of targets under a single per-kind timeout
//! and reports success if any target answers. Transport errors are never
//! fatal here; they degrade the report to `Failed`. Retry policy lives in
//! the sampler cadence itself: the next tick is the retry.

pub mod dns;
pub mod http;
pub mod ping;

use std::time::Duration;

use crate::config::ProbesConfig;
use crate::sample::ProbeStatus;

/// Outcome of probing every target of one probe kind.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    /// Mean latency over successful targets, where the transport measures one.
    pub avg_latency_ms: Option<f64>,
    /// Targets that failed to answer, for the sample notes.
    pub failed_targets: Vec<String>,
}

impl ProbeReport {
    /// Report for a probe kind with no configured targets.
    pub fn not_run() -> Self {
        Self {
            status: ProbeStatus::NotRun,
            avg_latency_ms: None,
            failed_targets: Vec::new(),
        }
    }

    fn from_results(latencies: Vec<f64>, failed_targets: Vec<String>, total: usize) -> Self {
        let succeeded = total - failed_targets.len();
        let status = if succeeded > 0 {
            ProbeStatus::Success
        } else {
            ProbeStatus::Failed
        };
        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };
        Self {
            status,
            avg_latency_ms,
            failed_targets,
        }
    }
}

/// The probe set consumed by the sampler.
///
/// Implemented by [`NetProber`] for real transports; tests substitute a
/// scripted implementation.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn ping(&self) -> ProbeReport;
    async fn dns(&self) -> ProbeReport;
    async fn http(&self) -> ProbeReport;
}

/// Production probe set over ICMP, the system resolver, and HTTP.
pub struct NetProber {
    config: ProbesConfig,
    client: reqwest::Client,
}

impl NetProber {
    /// Build the probe set, including its shared HTTP client.
    pub fn new(config: ProbesConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("netpulse/", env!("CARGO_PKG_VERSION")))
            .timeout(config.http_timeout + Duration::from_secs(1))
            .build()?;
        Ok(Self { config, client })
    }
}

impl std::fmt::Debug for NetProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetProber")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Prober for NetProber {
    async fn ping(&self) -> ProbeReport {
        ping::run(&self.config.ping_targets, self.config.ping_timeout).await
    }

    async fn dns(&self) -> ProbeReport {
        dns::run(&self.config.dns_hostnames, self.config.dns_timeout).await
    }

    async fn http(&self) -> ProbeReport {
        http::run(&self.client, &self.config.http_targets, self.config.http_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_not_run_has_no_latency() {
        let report = ProbeReport::not_run();
        assert_eq!(report.status, ProbeStatus::NotRun);
        assert!(report.avg_latency_ms.is_none());
        assert!(report.failed_targets.is_empty());
    }

    #[test]
    fn report_any_success_wins() {
        let report =
            ProbeReport::from_results(vec![10.0, 20.0], vec!["198.51.100.1".to_string()], 3);
        assert_eq!(report.status, ProbeStatus::Success);
        assert_eq!(report.avg_latency_ms, Some(15.0));
        assert_eq!(report.failed_targets.len(), 1);
    }

    #[test]
    fn report_all_failed() {
        let targets = vec!["a".to_string(), "b".to_string()];
        let report = ProbeReport::from_results(Vec::new(), targets, 2);
        assert_eq!(report.status, ProbeStatus::Failed);
        assert!(report.avg_latency_ms.is_none());
    }
}
