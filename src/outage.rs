//! Outage lifecycle tracking.
//!
//! [`OutageTracker`] consumes the sample stream and maintains the current
//! link state. It emits an [`OutageEvent`] on every state transition: an
//! `ONGOING` event when connectivity is lost and the same event, resolved
//! with an end time and durations, when connectivity returns. A resolved
//! event is never re-opened; a later disconnect opens a distinct event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::sample::Sample;

/// Lifecycle status of an outage record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum OutageStatus {
    Ongoing,
    Resolved,
}

/// One outage lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutageEvent {
    pub location_id: String,
    pub start_time: DateTime<Utc>,
    /// Absent while the outage is ongoing.
    pub end_time: Option<DateTime<Utc>>,
    pub status: OutageStatus,
    /// Derived from `end_time - start_time`; present only when resolved.
    pub duration_seconds: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub duration_hours: Option<f64>,
}

impl OutageEvent {
    /// Open a new ongoing outage starting at `start_time`.
    pub fn open(location_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            location_id: location_id.into(),
            start_time,
            end_time: None,
            status: OutageStatus::Ongoing,
            duration_seconds: None,
            duration_minutes: None,
            duration_hours: None,
        }
    }

    fn resolve(&mut self, end_time: DateTime<Utc>) {
        let seconds = (end_time - self.start_time).num_milliseconds() as f64 / 1000.0;
        self.end_time = Some(end_time);
        self.status = OutageStatus::Resolved;
        self.duration_seconds = Some(round2(seconds));
        self.duration_minutes = Some(round2(seconds / 60.0));
        self.duration_hours = Some(round2(seconds / 3600.0));
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug)]
enum LinkState {
    Up,
    Down { open: OutageEvent },
}

/// UP/DOWN state machine over the sample stream.
///
/// Mutated only by the sample-consumption path; samples are processed
/// strictly in emission order, so no internal locking is needed.
#[derive(Debug)]
pub struct OutageTracker {
    location_id: String,
    state: LinkState,
}

impl OutageTracker {
    /// Create a tracker in the optimistic `UP` state; the first sample
    /// establishes truth.
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            state: LinkState::Up,
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self.state, LinkState::Down { .. })
    }

    /// Feed one sample; returns an event to record when a transition occurred.
    pub fn observe(&mut self, sample: &Sample) -> Option<OutageEvent> {
        match (&mut self.state, sample.connected) {
            (LinkState::Up, false) => {
                let open = OutageEvent::open(self.location_id.clone(), sample.timestamp);
                tracing::warn!(
                    location = %self.location_id,
                    start = %open.start_time,
                    "Internet outage detected"
                );
                self.state = LinkState::Down { open: open.clone() };
                Some(open)
            }
            (LinkState::Down { open }, true) => {
                let mut resolved = open.clone();
                resolved.resolve(sample.timestamp);
                tracing::info!(
                    location = %self.location_id,
                    duration_minutes = resolved.duration_minutes.unwrap_or(0.0),
                    "Internet connectivity restored"
                );
                self.state = LinkState::Up;
                Some(resolved)
            }
            // UP + connected and DOWN + disconnected are both no-ops.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ProbeStatus;
    use chrono::TimeZone;

    fn sample_at(secs: i64, connected: bool) -> Sample {
        let status = if connected {
            ProbeStatus::Success
        } else {
            ProbeStatus::Failed
        };
        Sample {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            location_id: "house1".to_string(),
            ping: status,
            dns: status,
            http: status,
            avg_ping_ms: connected.then_some(12.0),
            connected,
            notes: String::new(),
        }
    }

    #[test]
    fn single_outage_scenario() {
        // Samples at t=0 (up), t=10 (down), t=40 (up) produce exactly one
        // resolved outage of 30 seconds.
        let mut tracker = OutageTracker::new("house1");

        assert!(tracker.observe(&sample_at(0, true)).is_none());

        let opened = tracker.observe(&sample_at(10, false)).unwrap();
        assert_eq!(opened.status, OutageStatus::Ongoing);
        assert_eq!(opened.start_time.timestamp(), 10);
        assert!(opened.end_time.is_none());
        assert!(opened.duration_seconds.is_none());

        let resolved = tracker.observe(&sample_at(40, true)).unwrap();
        assert_eq!(resolved.status, OutageStatus::Resolved);
        assert_eq!(resolved.start_time.timestamp(), 10);
        assert_eq!(resolved.end_time.unwrap().timestamp(), 40);
        assert_eq!(resolved.duration_seconds, Some(30.0));
        assert_eq!(resolved.duration_minutes, Some(0.5));
        assert!(!tracker.is_down());
    }

    #[test]
    fn repeated_disconnects_do_not_open_new_events() {
        let mut tracker = OutageTracker::new("house1");

        assert!(tracker.observe(&sample_at(0, false)).is_some());
        assert!(tracker.observe(&sample_at(10, false)).is_none());
        assert!(tracker.observe(&sample_at(20, false)).is_none());
        assert!(tracker.is_down());
    }

    #[test]
    fn repeated_connects_are_no_ops() {
        let mut tracker = OutageTracker::new("house1");

        assert!(tracker.observe(&sample_at(0, true)).is_none());
        assert!(tracker.observe(&sample_at(10, true)).is_none());
        assert!(!tracker.is_down());
    }

    #[test]
    fn new_disconnect_creates_distinct_event() {
        let mut tracker = OutageTracker::new("house1");

        let first = tracker.observe(&sample_at(10, false)).unwrap();
        let first_resolved = tracker.observe(&sample_at(20, true)).unwrap();
        assert_eq!(first_resolved.status, OutageStatus::Resolved);

        let second = tracker.observe(&sample_at(30, false)).unwrap();
        assert_eq!(second.status, OutageStatus::Ongoing);
        assert_ne!(first.start_time, second.start_time);
    }

    #[test]
    fn same_timestamp_later_sample_wins() {
        // Two samples with an identical timestamp: the later-emitted one
        // decides the transition.
        let mut tracker = OutageTracker::new("house1");

        assert!(tracker.observe(&sample_at(5, false)).is_some());
        let resolved = tracker.observe(&sample_at(5, true)).unwrap();
        assert_eq!(resolved.status, OutageStatus::Resolved);
        assert_eq!(resolved.duration_seconds, Some(0.0));
        assert!(!tracker.is_down());
    }

    #[test]
    fn sub_second_durations_round_to_two_places() {
        let mut event = OutageEvent::open("house1", Utc.timestamp_opt(0, 0).unwrap());
        event.resolve(
            Utc.timestamp_opt(0, 0).unwrap() + chrono::Duration::milliseconds(1_234),
        );
        assert_eq!(event.duration_seconds, Some(1.23));
    }
}
