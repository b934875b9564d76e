//! Remote tabular sink interface and row mapping.
//!
//! The reconciler talks to the remote store exclusively through the
//! [`Sink`] trait. [`sheets::SheetsSink`] is the production adapter; tests
//! substitute recording fakes. Row mapping lives here so every adapter
//! writes identical columns.

pub mod sheets;

pub use sheets::SheetsSink;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::outage::OutageEvent;
use crate::sample::{ProbeStatus, Sample};

/// Errors raised by a sink adapter. All are non-fatal to the process; the
/// reconciler records the failed attempt and retries next cycle.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Credentials rejected. Surfaced prominently: the buffer grows
    /// unbounded while this persists.
    #[error("sink authentication rejected: {0}")]
    Auth(String),

    /// Remote quota or rate limit hit.
    #[error("sink rate limited")]
    RateLimited,

    /// Network-level failure reaching the sink.
    #[error("sink transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other remote rejection.
    #[error("sink remote error ({status}): {message}")]
    Remote { status: u16, message: String },
}

impl SinkError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// The two logical tables of the remote sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Table {
    #[strum(serialize = "Connectivity_Checks")]
    ConnectivityChecks,
    #[strum(serialize = "Outages")]
    Outages,
}

impl Table {
    /// Header row, in exact column order.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Self::ConnectivityChecks => &[
                "Timestamp",
                "Location_ID",
                "Connected",
                "Ping_Success",
                "HTTP_Success",
                "DNS_Success",
                "Avg_Ping_MS",
                "Notes",
            ],
            Self::Outages => &[
                "Location_ID",
                "Start_Time",
                "End_Time",
                "Duration_Seconds",
                "Duration_Minutes",
                "Duration_Hours",
                "Status",
            ],
        }
    }
}

/// Remote sink adapter consumed by the reconciler.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Create the two logical tables with their header rows if missing.
    /// Idempotent: re-running against existing tables is a no-op.
    async fn ensure_tables(&self) -> Result<(), SinkError>;

    /// Append one row to a table.
    async fn append_row(&self, table: Table, row: Vec<Value>) -> Result<(), SinkError>;

    /// Upsert an outage row keyed by `(location_id, start_time)`: a
    /// resolved update overwrites the prior ongoing row instead of
    /// duplicating it.
    async fn upsert_outage_row(
        &self,
        location_id: &str,
        start_time: DateTime<Utc>,
        row: Vec<Value>,
    ) -> Result<(), SinkError>;
}

fn status_cell(status: ProbeStatus) -> Value {
    match status {
        ProbeStatus::Success => json!("TRUE"),
        ProbeStatus::Failed => json!("FALSE"),
        ProbeStatus::NotRun => json!(""),
    }
}

/// Map a sample to a `Connectivity_Checks` row.
pub fn sample_row(sample: &Sample) -> Vec<Value> {
    vec![
        json!(sample.timestamp.to_rfc3339()),
        json!(sample.location_id),
        json!(if sample.connected { "TRUE" } else { "FALSE" }),
        status_cell(sample.ping),
        status_cell(sample.http),
        status_cell(sample.dns),
        sample
            .avg_ping_ms
            .map(|ms| json!((ms * 100.0).round() / 100.0))
            .unwrap_or_else(|| json!("")),
        json!(sample.notes),
    ]
}

/// Map an outage event to an `Outages` row.
pub fn outage_row(event: &OutageEvent) -> Vec<Value> {
    let opt_time = |t: Option<DateTime<Utc>>| {
        t.map(|t| json!(t.to_rfc3339())).unwrap_or_else(|| json!(""))
    };
    let opt_num =
        |v: Option<f64>| v.map(|v| json!(v)).unwrap_or_else(|| json!(""));
    vec![
        json!(event.location_id),
        json!(event.start_time.to_rfc3339()),
        opt_time(event.end_time),
        opt_num(event.duration_seconds),
        opt_num(event.duration_minutes),
        opt_num(event.duration_hours),
        json!(event.status.as_ref()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn table_headers_match_schema() {
        assert_eq!(Table::ConnectivityChecks.headers().len(), 8);
        assert_eq!(Table::Outages.headers().len(), 7);
        assert_eq!(Table::ConnectivityChecks.as_ref(), "Connectivity_Checks");
        assert_eq!(Table::Outages.as_ref(), "Outages");
    }

    #[test]
    fn sample_row_columns() {
        let sample = Sample {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            location_id: "house1".to_string(),
            ping: ProbeStatus::Success,
            dns: ProbeStatus::Failed,
            http: ProbeStatus::Success,
            avg_ping_ms: Some(12.345),
            connected: true,
            notes: "DNS failed: 8.8.8.8".to_string(),
        };

        let row = sample_row(&sample);
        assert_eq!(row.len(), Table::ConnectivityChecks.headers().len());
        assert_eq!(row[1], json!("house1"));
        assert_eq!(row[2], json!("TRUE"));
        assert_eq!(row[3], json!("TRUE")); // ping
        assert_eq!(row[4], json!("TRUE")); // http
        assert_eq!(row[5], json!("FALSE")); // dns
        assert_eq!(row[6], json!(12.35));
    }

    #[test]
    fn ongoing_outage_row_has_empty_tail() {
        let event = OutageEvent::open("house1", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let row = outage_row(&event);
        assert_eq!(row.len(), Table::Outages.headers().len());
        assert_eq!(row[2], json!(""));
        assert_eq!(row[3], json!(""));
        assert_eq!(row[6], json!("ONGOING"));
    }

    #[test]
    fn not_run_probe_maps_to_empty_cell() {
        let sample = Sample {
            timestamp: Utc::now(),
            location_id: "house1".to_string(),
            ping: ProbeStatus::NotRun,
            dns: ProbeStatus::Success,
            http: ProbeStatus::Success,
            avg_ping_ms: None,
            connected: true,
            notes: String::new(),
        };
        let row = sample_row(&sample);
        assert_eq!(row[3], json!(""));
        assert_eq!(row[6], json!(""));
    }
}
