//! DNS resolution probe.
//!
//! Resolves well-known hostnames through the system resolver. A hostname
//! counts as answered when the lookup returns at least one address within
//! the timeout.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;

use super::ProbeReport;

/// Resolve every hostname concurrently; success if any resolves.
pub(crate) async fn run(hostnames: &[String], probe_timeout: Duration) -> ProbeReport {
    if hostnames.is_empty() {
        return ProbeReport::not_run();
    }

    let mut set = JoinSet::new();
    for hostname in hostnames {
        set.spawn(resolve(hostname.clone(), probe_timeout));
    }

    let mut failed = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, true)) => {}
            Ok((hostname, false)) => failed.push(hostname),
            Err(e) => tracing::warn!(error = %e, "DNS task panicked"),
        }
    }

    ProbeReport::from_results(Vec::new(), failed, hostnames.len())
}

async fn resolve(hostname: String, probe_timeout: Duration) -> (String, bool) {
    let lookup = tokio::net::lookup_host(format!("{hostname}:0"));
    match timeout(probe_timeout, lookup).await {
        Ok(Ok(mut addrs)) => {
            let ok = addrs.next().is_some();
            if !ok {
                tracing::debug!(hostname = %hostname, "DNS lookup returned no addresses");
            }
            (hostname, ok)
        }
        Ok(Err(e)) => {
            tracing::debug!(hostname = %hostname, error = %e, "DNS lookup failed");
            (hostname, false)
        }
        Err(_) => {
            tracing::debug!(
                hostname = %hostname,
                timeout_ms = probe_timeout.as_millis(),
                "DNS lookup timed out"
            );
            (hostname, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ProbeStatus;

    #[tokio::test]
    async fn empty_hostname_list_is_not_run() {
        let report = run(&[], Duration::from_secs(1)).await;
        assert_eq!(report.status, ProbeStatus::NotRun);
    }

    #[tokio::test]
    async fn localhost_resolves() {
        let report = run(&["localhost".to_string()], Duration::from_secs(2)).await;
        assert_eq!(report.status, ProbeStatus::Success);
        assert!(report.failed_targets.is_empty());
    }

    #[tokio::test]
    async fn invalid_hostname_fails() {
        let report = run(
            &["host.invalid.netpulse.test".to_string()],
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(report.status, ProbeStatus::Failed);
        assert_eq!(report.failed_targets, vec!["host.invalid.netpulse.test"]);
    }
}
