//! In-memory [`BufferStore`] for tests and ephemeral runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{BufferEntry, BufferError, BufferStore, Payload};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<u64, BufferEntry>,
    next_id: u64,
}

/// Non-durable buffer with the same semantics as the file journal.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    inner: Mutex<Inner>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attempt count of an entry, delivered or not. Test inspection hook.
    pub fn attempt_count(&self, id: u64) -> Option<u32> {
        self.lock().entries.get(&id).map(|e| e.attempt_count)
    }

    /// Whether an entry has been marked delivered. Test inspection hook.
    pub fn is_delivered(&self, id: u64) -> Option<bool> {
        self.lock().entries.get(&id).map(|e| e.delivered)
    }
}

impl BufferStore for MemoryBuffer {
    fn append(&self, payload: Payload) -> Result<u64, BufferError> {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            id,
            BufferEntry {
                id,
                payload,
                delivered: false,
                attempt_count: 0,
                last_attempt: None,
            },
        );
        Ok(id)
    }

    fn list_undelivered(&self) -> Result<Vec<BufferEntry>, BufferError> {
        let inner = self.lock();
        Ok(inner
            .entries
            .values()
            .filter(|e| !e.delivered)
            .cloned()
            .collect())
    }

    fn mark_delivered(&self, id: u64) -> Result<(), BufferError> {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.delivered = true;
        }
        Ok(())
    }

    fn note_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<(), BufferError> {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.attempt_count += 1;
            entry.last_attempt = Some(at);
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.lock().entries.values().filter(|e| !e.delivered).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{ProbeStatus, Sample};

    fn payload() -> Payload {
        Payload::Sample(Sample {
            timestamp: Utc::now(),
            location_id: "house1".to_string(),
            ping: ProbeStatus::Failed,
            dns: ProbeStatus::Failed,
            http: ProbeStatus::Failed,
            avg_ping_ms: None,
            connected: false,
            notes: String::new(),
        })
    }

    #[test]
    fn append_list_mark_cycle() {
        let buffer = MemoryBuffer::new();
        let a = buffer.append(payload()).unwrap();
        let b = buffer.append(payload()).unwrap();
        assert_eq!(buffer.pending(), 2);

        buffer.mark_delivered(a).unwrap();
        buffer.mark_delivered(a).unwrap(); // idempotent
        let remaining = buffer.list_undelivered().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
        assert_eq!(buffer.is_delivered(a), Some(true));
    }
}
