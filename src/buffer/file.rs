//! Append-only JSONL journal backing the durable buffer.
//!
//! One JSON record per line, so the file stays human-inspectable and every
//! write is a pure append. Two record shapes exist: an entry carrying a
//! payload, and a delivered tombstone referencing an earlier entry id.
//! Replaying the file on open rebuilds the undelivered set, which makes
//! both appends and delivery marks survive process restarts.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BufferEntry, BufferError, BufferStore, Payload};

/// Default delivered-entry count that triggers a journal rewrite.
const DEFAULT_COMPACT_THRESHOLD: usize = 512;

/// One line of the journal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JournalRecord {
    Entry { id: u64, payload: Payload },
    Delivered { id: u64 },
}

#[derive(Debug)]
struct EntryState {
    payload: Payload,
    delivered: bool,
    attempt_count: u32,
    last_attempt: Option<DateTime<Utc>>,
}

struct Inner {
    file: File,
    entries: BTreeMap<u64, EntryState>,
    next_id: u64,
    delivered_count: usize,
}

/// File-backed [`BufferStore`].
///
/// A single mutex serializes the appending writer and the reconciling
/// reader; every append and delivery mark is flushed and synced before the
/// call returns.
pub struct FileBuffer {
    path: PathBuf,
    compact_threshold: usize,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileBuffer {
    /// Open (or create) the journal at `path`, replaying existing records.
    ///
    /// Fully delivered entries are compacted away during replay. A corrupt
    /// trailing line (torn write from a crash) is skipped with a warning
    /// rather than refusing to start.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BufferError> {
        Self::open_with_threshold(path, DEFAULT_COMPACT_THRESHOLD)
    }

    /// Open the journal with an explicit compaction threshold: the number
    /// of delivered records allowed to accumulate before a rewrite.
    pub fn open_with_threshold(
        path: impl AsRef<Path>,
        compact_threshold: usize,
    ) -> Result<Self, BufferError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut entries: BTreeMap<u64, EntryState> = BTreeMap::new();
        let mut next_id = 1u64;

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalRecord>(&line) {
                    Ok(JournalRecord::Entry { id, payload }) => {
                        next_id = next_id.max(id + 1);
                        entries.insert(
                            id,
                            EntryState {
                                payload,
                                delivered: false,
                                attempt_count: 0,
                                last_attempt: None,
                            },
                        );
                    }
                    Ok(JournalRecord::Delivered { id }) => {
                        if let Some(state) = entries.get_mut(&id) {
                            state.delivered = true;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "Skipping corrupt journal line"
                        );
                    }
                }
            }
        }

        // Drop delivered entries and rewrite the journal without them.
        let before = entries.len();
        entries.retain(|_, state| !state.delivered);
        let compacted = before - entries.len();
        rewrite(&path, &entries)?;
        if compacted > 0 {
            tracing::info!(
                path = %path.display(),
                compacted,
                pending = entries.len(),
                "Compacted journal on open"
            );
        }

        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            path,
            compact_threshold: compact_threshold.max(1),
            inner: Mutex::new(Inner {
                file,
                entries,
                next_id,
                delivered_count: 0,
            }),
        })
    }

    fn write_record(inner: &mut Inner, record: &JournalRecord) -> Result<(), BufferError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        inner.file.write_all(line.as_bytes())?;
        inner.file.flush()?;
        inner.file.sync_data()?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-write; the journal on disk is
        // still consistent, so continue with the in-memory state we have.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rewrite the journal keeping only undelivered entries.
    fn compact(&self, inner: &mut Inner) -> Result<(), BufferError> {
        inner.entries.retain(|_, state| !state.delivered);
        inner.delivered_count = 0;
        rewrite(&self.path, &inner.entries)?;
        inner.file = OpenOptions::new().append(true).open(&self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            pending = inner.entries.len(),
            "Compacted journal"
        );
        Ok(())
    }
}

/// Atomically replace the journal with the given undelivered entries.
fn rewrite(path: &Path, entries: &BTreeMap<u64, EntryState>) -> Result<(), BufferError> {
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        for (id, state) in entries {
            let record = JournalRecord::Entry {
                id: *id,
                payload: state.payload.clone(),
            };
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            tmp.write_all(line.as_bytes())?;
        }
        tmp.sync_data()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl BufferStore for FileBuffer {
    fn append(&self, payload: Payload) -> Result<u64, BufferError> {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        Self::write_record(
            &mut inner,
            &JournalRecord::Entry {
                id,
                payload: payload.clone(),
            },
        )?;
        inner.entries.insert(
            id,
            EntryState {
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
            .iter()
            .filter(|(_, state)| !state.delivered)
            .map(|(id, state)| BufferEntry {
                id: *id,
                payload: state.payload.clone(),
                delivered: false,
                attempt_count: state.attempt_count,
                last_attempt: state.last_attempt,
            })
            .collect())
    }

    fn mark_delivered(&self, id: u64) -> Result<(), BufferError> {
        let mut inner = self.lock();
        match inner.entries.get(&id) {
            Some(state) if !state.delivered => {}
            // Already delivered or compacted away: no-op.
            _ => return Ok(()),
        }

        Self::write_record(&mut inner, &JournalRecord::Delivered { id })?;
        if let Some(state) = inner.entries.get_mut(&id) {
            state.delivered = true;
        }
        inner.delivered_count += 1;

        if inner.delivered_count >= self.compact_threshold {
            self.compact(&mut inner)?;
        }
        Ok(())
    }

    fn note_attempt(&self, id: u64, at: DateTime<Utc>) -> Result<(), BufferError> {
        let mut inner = self.lock();
        if let Some(state) = inner.entries.get_mut(&id) {
            state.attempt_count += 1;
            state.last_attempt = Some(at);
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        let inner = self.lock();
        inner
            .entries
            .values()
            .filter(|state| !state.delivered)
            .count()
    }
}
