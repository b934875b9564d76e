//! Configuration module for the netpulse monitor.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Monitor identity and cadence (location id, check interval, quorum rule)
//! - Probe targets and per-kind timeouts (ping, DNS, HTTP)
//! - Durable buffer settings (journal path, optional retention cap)
//! - Reconciler cadence and backoff
//! - Remote sink settings (spreadsheet id, endpoint, access token source)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::sample::QuorumRule;

// =============================================================================
// Constants
// =============================================================================

/// Default check interval (60 seconds).
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-probe timeout (5 seconds).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default reconciler base interval (2 minutes).
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(120);

/// Default reconciler backoff cap (15 minutes).
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(900);

/// Default journal path, relative to the working directory.
pub const DEFAULT_BUFFER_PATH: &str = "monitor_data/backlog.jsonl";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Identifier of the monitored site, recorded on every sample.
    pub location_id: String,

    /// Interval between connectivity checks (default: "1m").
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub check_interval: Duration,

    /// Rule deriving the connected verdict from probe outcomes.
    #[serde(default)]
    pub quorum: QuorumRule,

    /// Probe targets and timeouts.
    #[serde(default)]
    pub probes: ProbesConfig,

    /// Durable buffer settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Reconciler cadence and backoff.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Remote sink settings.
    pub sink: SinkConfig,
}

/// Probe target lists and per-kind timeouts.
///
/// A probe kind with an empty target list is skipped and reports NotRun.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Hosts pinged over ICMP; IP addresses or resolvable hostnames.
    pub ping_targets: Vec<String>,

    /// Per-target ping timeout (default: "5s").
    #[serde(with = "humantime_serde")]
    pub ping_timeout: Duration,

    /// Hostnames resolved through the system resolver.
    pub dns_hostnames: Vec<String>,

    /// Per-hostname resolution timeout (default: "5s").
    #[serde(with = "humantime_serde")]
    pub dns_timeout: Duration,

    /// URLs fetched with GET; any 2xx counts as success.
    pub http_targets: Vec<String>,

    /// Per-request HTTP timeout (default: "5s").
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            ping_targets: vec![
                "8.8.8.8".to_string(),
                "1.1.1.1".to_string(),
                "208.67.222.222".to_string(),
            ],
            ping_timeout: DEFAULT_PROBE_TIMEOUT,
            dns_hostnames: vec!["google.com".to_string(), "cloudflare.com".to_string()],
            dns_timeout: DEFAULT_PROBE_TIMEOUT,
            http_targets: vec![
                "https://www.google.com".to_string(),
                "https://www.cloudflare.com".to_string(),
                "https://www.github.com".to_string(),
            ],
            http_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Durable buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Journal file path; parent directories are created on startup.
    pub path: PathBuf,

    /// Optional cap on retained delivered records during compaction.
    /// Undelivered records are never dropped.
    pub max_delivered_records: Option<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_BUFFER_PATH),
            max_delivered_records: Some(1000),
        }
    }
}

/// Reconciler cadence and backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Base interval between drain cycles (default: "2m").
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Ceiling for exponential backoff after repeated failures
    /// (default: "15m").
    #[serde(with = "humantime_serde")]
    pub backoff_cap: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Remote sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Target spreadsheet id.
    pub spreadsheet_id: String,

    /// API endpoint override; unset means the public Sheets API.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// File holding the bearer access token; takes precedence over
    /// `token_env` when set.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

fn default_token_env() -> String {
    "NETPULSE_SHEETS_TOKEN".to_string()
}

impl SinkConfig {
    /// Resolve the access token from the configured file or environment
    /// variable. The token itself never appears in the config file.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        if let Some(path) = &self.token_file {
            let token = std::fs::read_to_string(path)?;
            let token = token.trim();
            if token.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "token file {} is empty",
                    path.display()
                )));
            }
            return Ok(token.to_string());
        }
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ConfigError::ValidationError(format!(
                "sink token not found: set {} or sink.token_file",
                self.token_env
            ))),
        }
    }
}

impl MonitorConfig {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.location_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "location_id must not be empty".to_string(),
            ));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "check_interval must be positive".to_string(),
            ));
        }
        if self.reconciler.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconciler.interval must be positive".to_string(),
            ));
        }
        if self.reconciler.backoff_cap < self.reconciler.interval {
            return Err(ConfigError::ValidationError(
                "reconciler.backoff_cap must be at least reconciler.interval".to_string(),
            ));
        }
        if self.sink.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sink.spreadsheet_id must not be empty".to_string(),
            ));
        }
        self.probes.validate()?;
        Ok(())
    }
}

impl ProbesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_targets.is_empty()
            && self.dns_hostnames.is_empty()
            && self.http_targets.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "at least one probe target must be configured".to_string(),
            ));
        }
        for (kind, timeout) in [
            ("ping_timeout", self.ping_timeout),
            ("dns_timeout", self.dns_timeout),
            ("http_timeout", self.http_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "{kind} must be positive"
                )));
            }
        }
        for list in [&self.ping_targets, &self.dns_hostnames, &self.http_targets] {
            let mut seen = HashSet::new();
            for target in list {
                if target.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "probe targets must not be empty strings".to_string(),
                    ));
                }
                if !seen.insert(target.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "duplicate probe target: {target}"
                    )));
                }
            }
        }
        for url in &self.http_targets {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "http target must be an http(s) URL: {url}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = write_config(
            r#"
location_id: house1
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let config = MonitorConfig::load(file.path()).unwrap();

        assert_eq!(config.location_id, "house1");
        assert_eq!(config.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(config.quorum, QuorumRule::PingOrHttp);
        assert_eq!(config.probes.ping_targets.len(), 3);
        assert_eq!(config.probes.ping_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.buffer.path, PathBuf::from(DEFAULT_BUFFER_PATH));
        assert_eq!(config.reconciler.interval, DEFAULT_RECONCILE_INTERVAL);
        assert_eq!(config.sink.token_env, "NETPULSE_SHEETS_TOKEN");
    }

    #[test]
    fn full_config_round_trip() {
        let file = write_config(
            r#"
location_id: cabin
check_interval: 30s
quorum: ping-and-web
probes:
  ping_targets: ["9.9.9.9"]
  ping_timeout: 2s
  dns_hostnames: ["example.org"]
  dns_timeout: 3s
  http_targets: ["https://example.org"]
  http_timeout: 4s
buffer:
  path: /tmp/netpulse/backlog.jsonl
  max_delivered_records: 200
reconciler:
  interval: 1m
  backoff_cap: 10m
sink:
  spreadsheet_id: sheet-123
  token_env: MY_TOKEN
"#,
        );
        let config = MonitorConfig::load(file.path()).unwrap();

        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.quorum, QuorumRule::PingAndWeb);
        assert_eq!(config.probes.ping_timeout, Duration::from_secs(2));
        assert_eq!(config.buffer.max_delivered_records, Some(200));
        assert_eq!(config.reconciler.backoff_cap, Duration::from_secs(600));
        assert_eq!(config.sink.token_env, "MY_TOKEN");
    }

    #[test]
    fn empty_location_id_rejected() {
        let file = write_config(
            r#"
location_id: "  "
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let err = MonitorConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn all_probe_lists_empty_rejected() {
        let file = write_config(
            r#"
location_id: house1
probes:
  ping_targets: []
  dns_hostnames: []
  http_targets: []
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let err = MonitorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("at least one probe target"));
    }

    #[test]
    fn duplicate_target_rejected() {
        let file = write_config(
            r#"
location_id: house1
probes:
  ping_targets: ["8.8.8.8", "8.8.8.8"]
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let err = MonitorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate probe target"));
    }

    #[test]
    fn non_http_url_rejected() {
        let file = write_config(
            r#"
location_id: house1
probes:
  http_targets: ["ftp://example.org"]
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let err = MonitorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));
    }

    #[test]
    fn backoff_cap_below_interval_rejected() {
        let file = write_config(
            r#"
location_id: house1
reconciler:
  interval: 5m
  backoff_cap: 1m
sink:
  spreadsheet_id: sheet-123
"#,
        );
        let err = MonitorConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("backoff_cap"));
    }

    #[test]
    fn token_resolved_from_file() {
        let mut token_file = NamedTempFile::new().unwrap();
        token_file.write_all(b"ya29.secret-token\n").unwrap();

        let sink = SinkConfig {
            spreadsheet_id: "sheet-123".to_string(),
            endpoint: None,
            token_env: "UNSET_VAR_FOR_TEST".to_string(),
            token_file: Some(token_file.path().to_path_buf()),
        };
        assert_eq!(sink.resolve_token().unwrap(), "ya29.secret-token");
    }

    #[test]
    fn missing_token_is_an_error() {
        let sink = SinkConfig {
            spreadsheet_id: "sheet-123".to_string(),
            endpoint: None,
            token_env: "NETPULSE_TEST_NO_SUCH_TOKEN".to_string(),
            token_file: None,
        };
        let err = sink.resolve_token().unwrap_err();
        assert!(err.to_string().contains("sink token not found"));
    }
}
