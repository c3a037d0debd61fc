//! Shared debouncing for file change events.
//!
//! Bursts of notifications (auto-save, formatter rewrites, a git
//! checkout touching many files) are coalesced per scope, one scope
//! per file category, into a single flush after a quiet window.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::types::FileCategory;

#[derive(Debug, Default)]
struct Scope {
    /// Distinct changed paths accumulated since the last flush.
    pending: HashSet<PathBuf>,
    /// Most recent notification; the quiet window restarts from here.
    last_event: Option<Instant>,
    /// Single-flight: a scope mid-flush cannot be drained again until
    /// `finish_flush` runs. Arrivals meanwhile wait for the next window.
    flushing: bool,
}

/// Coalesces change notifications per scope until a quiet window passes.
#[derive(Debug)]
pub struct Debouncer {
    scopes: HashMap<FileCategory, Scope>,
    duration: Duration,
}

impl Debouncer {
    /// Create a debouncer with the given quiet window in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            scopes: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a change notification, restarting the scope's window.
    ///
    /// A path already pending stays pending once; the set never holds
    /// duplicates.
    pub fn record(&mut self, scope: FileCategory, path: PathBuf) {
        let entry = self.scopes.entry(scope).or_default();
        entry.pending.insert(path);
        entry.last_event = Some(Instant::now());
    }

    /// Drop a single pending path (e.g. its event was a self-write).
    pub fn remove(&mut self, scope: FileCategory, path: &Path) {
        if let Some(entry) = self.scopes.get_mut(&scope) {
            entry.pending.remove(path);
        }
    }

    /// Drain every scope whose quiet window has elapsed and that is not
    /// mid-flush. Draining clears the pending set and marks the scope
    /// flushing; callers must pair each drained scope with
    /// `finish_flush` once the flush resolves.
    pub fn take_ready(&mut self) -> Vec<(FileCategory, Vec<PathBuf>)> {
        let now = Instant::now();
        let mut ready = Vec::new();

        for (category, scope) in &mut self.scopes {
            if scope.flushing || scope.pending.is_empty() {
                continue;
            }
            let Some(last) = scope.last_event else {
                continue;
            };
            if now.duration_since(last) >= self.duration {
                let mut paths: Vec<PathBuf> = scope.pending.drain().collect();
                paths.sort();
                scope.flushing = true;
                ready.push((*category, paths));
            }
        }

        ready
    }

    /// Mark a drained scope's flush as resolved, re-arming it.
    pub fn finish_flush(&mut self, scope: FileCategory) {
        if let Some(entry) = self.scopes.get_mut(&scope) {
            entry.flushing = false;
        }
    }

    /// Check if any scope has pending changes.
    pub fn has_pending(&self) -> bool {
        self.scopes.values().any(|s| !s.pending.is_empty())
    }

    /// Number of pending paths in one scope.
    pub fn pending_count(&self, scope: FileCategory) -> usize {
        self.scopes.get(&scope).map_or(0, |s| s.pending.len())
    }
}
