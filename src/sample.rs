//! Connectivity sample types and the quorum rule.
//!
//! A [`Sample`] is one aggregated connectivity measurement: the outcome of
//! the three probe kinds plus the overall verdict. The verdict is always
//! derived through [`QuorumRule::connected`]; it is never set independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Outcome of one probe kind within a sample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProbeStatus {
    /// At least one target of this probe kind answered.
    Success,
    /// Every target failed or timed out.
    Failed,
    /// The probe kind has no configured targets and was skipped.
    NotRun,
}

impl ProbeStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Rule deciding overall connectivity from the three probe outcomes.
///
/// The rule is a pure function of the probe statuses; `NotRun` never counts
/// as a success.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum QuorumRule {
    /// Connected iff ping or HTTP succeeded.
    #[default]
    PingOrHttp,
    /// Connected only when all three probes succeeded.
    All,
    /// Connected iff ping succeeded and at least one of HTTP/DNS succeeded.
    PingAndWeb,
}

impl QuorumRule {
    /// Evaluate the rule for one set of probe outcomes.
    pub fn connected(self, ping: ProbeStatus, dns: ProbeStatus, http: ProbeStatus) -> bool {
        match self {
            Self::PingOrHttp => ping.is_success() || http.is_success(),
            Self::All => ping.is_success() && dns.is_success() && http.is_success(),
            Self::PingAndWeb => ping.is_success() && (http.is_success() || dns.is_success()),
        }
    }
}

/// One aggregated connectivity measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Measurement timestamp (UTC); orders samples within the buffer.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the monitored site; constant per process run.
    pub location_id: String,
    /// Ping probe outcome.
    pub ping: ProbeStatus,
    /// DNS probe outcome.
    pub dns: ProbeStatus,
    /// HTTP probe outcome.
    pub http: ProbeStatus,
    /// Mean RTT over successful ping targets; present only when `ping` succeeded.
    pub avg_ping_ms: Option<f64>,
    /// Overall verdict, derived from the quorum rule.
    pub connected: bool,
    /// Summary of which probes failed and against which targets.
    pub notes: String,
}
