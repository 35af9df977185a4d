//! Per-file quiet-interval debouncing.
//!
//! A file is handed out only after it has gone a full quiet interval without
//! new events *and* its size and mtime did not change across that interval.
//! Each pending file owns an independent deadline that further events reset.

use std::collections::HashMap;
use std::fs;
use std::future::poll_fn;
use std::path::{Path, PathBuf};
use std::task::Poll;
use std::time::{Duration, SystemTime};

use tokio_util::time::{DelayQueue, delay_queue};

/// Size and mtime at the time a deadline was (re)armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = fs::symlink_metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(Fingerprint {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

#[derive(Debug)]
struct Pending {
    key: delay_queue::Key,
    fingerprint: Option<Fingerprint>,
    /// Detection order, so files are released FIFO.
    seq: u64,
}

/// Debounces newly observed files by path.
#[derive(Debug)]
pub struct Debouncer {
    queue: DelayQueue<PathBuf>,
    pending: HashMap<PathBuf, Pending>,
    quiet: Duration,
    next_seq: u64,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            queue: DelayQueue::new(),
            pending: HashMap::new(),
            quiet,
            next_seq: 0,
        }
    }

    /// Track `path`, or restart its deadline if already pending.
    pub fn record(&mut self, path: PathBuf) {
        let current = fingerprint(&path);
        match self.pending.get_mut(&path) {
            Some(pending) => {
                self.queue.reset(&pending.key, self.quiet);
                pending.fingerprint = current;
            }
            None => {
                let key = self.queue.insert(path.clone(), self.quiet);
                let seq = self.next_seq;
                self.next_seq += 1;
                self.pending.insert(
                    path,
                    Pending {
                        key,
                        fingerprint: current,
                        seq,
                    },
                );
            }
        }
    }

    /// Restart the deadline of an already pending file. Returns false otherwise.
    pub fn touch(&mut self, path: &Path) -> bool {
        if !self.pending.contains_key(path) {
            return false;
        }
        self.record(path.to_path_buf());
        true
    }

    /// Stop tracking `path` (renamed away or deleted).
    pub fn remove(&mut self, path: &Path) -> bool {
        match self.pending.remove(path) {
            Some(pending) => {
                self.queue.try_remove(&pending.key);
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the next deadline(s) and return the files that are stable.
    ///
    /// Files that changed during their interval are re-armed; files that
    /// vanished are dropped. The result may be empty and is ordered by
    /// detection. Never resolves while nothing is pending, so guard the call
    /// with [`Debouncer::has_pending`] when selecting on it.
    ///
    /// Cancel safe: expired entries are only taken in the poll that completes.
    pub async fn ready(&mut self) -> Vec<PathBuf> {
        let mut expired = Vec::new();
        poll_fn(|cx| {
            while let Poll::Ready(Some(item)) = self.queue.poll_expired(cx) {
                expired.push(item.into_inner());
            }
            if expired.is_empty() {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;

        let mut stable = Vec::new();
        for path in expired {
            let Some(pending) = self.pending.remove(&path) else {
                continue;
            };
            match fingerprint(&path) {
                None => {
                    crate::debug_event!("debounce", "vanished", "{}", path.display());
                }
                Some(now) if Some(now) != pending.fingerprint => {
                    crate::debug_event!("debounce", "still changing", "{}", path.display());
                    let key = self.queue.insert(path.clone(), self.quiet);
                    self.pending.insert(
                        path,
                        Pending {
                            key,
                            fingerprint: Some(now),
                            seq: pending.seq,
                        },
                    );
                }
                Some(_) => stable.push((pending.seq, path)),
            }
        }

        stable.sort_by_key(|(seq, _)| *seq);
        stable.into_iter().map(|(_, path)| path).collect()
    }
}
