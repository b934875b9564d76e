//! ICMP ping probe.

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::ProbeReport;

/// Ping every target concurrently; the kind succeeds if any target replies.
pub(crate) async fn run(targets: &[String], probe_timeout: Duration) -> ProbeReport {
    if targets.is_empty() {
        return ProbeReport::not_run();
    }

    let mut set = JoinSet::new();
    for target in targets {
        set.spawn(ping_target(target.clone(), probe_timeout));
    }

    let mut latencies = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Some(ms))) => latencies.push(ms),
            Ok((target, None)) => failed.push(target),
            Err(e) => tracing::warn!(error = %e, "Ping task panicked"),
        }
    }

    ProbeReport::from_results(latencies, failed, targets.len())
}

/// Ping one target once; returns the RTT in milliseconds on success.
async fn ping_target(target: String, probe_timeout: Duration) -> (String, Option<f64>) {
    let ip_addr = match resolve_host(&target).await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Failed to resolve ping target");
            return (target, None);
        }
    };

    let client = match ip_addr {
        IpAddr::V4(_) => Client::new(&Config::default()),
        IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
    };
    let client = match client {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Failed to create ICMP client");
            return (target, None);
        }
    };

    let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
    pinger.timeout(probe_timeout);

    match timeout(probe_timeout, pinger.ping(PingSequence(0), &[])).await {
        Ok(Ok((_, rtt))) => {
            let ms = rtt.as_secs_f64() * 1000.0;
            tracing::debug!(target = %target, latency_ms = ms, "Ping succeeded");
            (target, Some(ms))
        }
        Ok(Err(e)) => {
            tracing::debug!(target = %target, error = %e, "Ping failed");
            (target, None)
        }
        Err(_) => {
            tracing::debug!(
                target = %target,
                timeout_ms = probe_timeout.as_millis(),
                "Ping timed out"
            );
            (target, None)
        }
    }
}

/// Resolve a hostname to an IP address, accepting literal addresses directly.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}
