//! HTTP fetch probe.

use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::ProbeReport;

/// Fetch every URL concurrently; success if any returns a 2xx status.
pub(crate) async fn run(client: &Client, urls: &[String], probe_timeout: Duration) -> ProbeReport {
    if urls.is_empty() {
        return ProbeReport::not_run();
    }

    let mut set = JoinSet::new();
    for url in urls {
        set.spawn(fetch(client.clone(), url.clone(), probe_timeout));
    }

    let mut failed = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, true)) => {}
            Ok((url, false)) => failed.push(url),
            Err(e) => tracing::warn!(error = %e, "HTTP task panicked"),
        }
    }

    ProbeReport::from_results(Vec::new(), failed, urls.len())
}

async fn fetch(client: Client, url: String, probe_timeout: Duration) -> (String, bool) {
    let request = client.get(&url).timeout(probe_timeout).send();
    match timeout(probe_timeout, request).await {
        Ok(Ok(response)) => {
            let status = response.status();
            if status.is_success() {
                tracing::debug!(url = %url, status = %status, "HTTP probe succeeded");
                (url, true)
            } else {
                tracing::debug!(url = %url, status = %status, "HTTP probe got error status");
                (url, false)
            }
        }
        Ok(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "HTTP probe failed");
            (url, false)
        }
        Err(_) => {
            tracing::debug!(
                url = %url,
                timeout_ms = probe_timeout.as_millis(),
                "HTTP probe timed out"
            );
            (url, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ProbeStatus;

    #[tokio::test]
    async fn empty_url_list_is_not_run() {
        let client = Client::new();
        let report = run(&client, &[], Duration::from_secs(1)).await;
        assert_eq!(report.status, ProbeStatus::NotRun);
    }

    #[tokio::test]
    async fn unreachable_url_fails_without_error() {
        let client = Client::new();
        let report = run(
            &client,
            &["http://host.invalid.netpulse.test/".to_string()],
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(report.status, ProbeStatus::Failed);
        assert_eq!(report.failed_targets.len(), 1);
    }
}
