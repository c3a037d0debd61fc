//! Write-lock table for feedback-loop prevention.
//!
//! Every derived write the pipeline performs lands on a watched path,
//! so the resulting file-system event would be indistinguishable from a
//! user edit. Before issuing a write, the router adds a lock for the
//! output path; when the corresponding event arrives, the router
//! consumes the lock instead of dispatching the event.
//!
//! Reference counting, not a boolean: two in-flight chains may target
//! the same output path, and one completion must not release a lock the
//! other still needs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug)]
struct Entry {
    count: usize,
    /// When this path was most recently locked, for stale-lock reporting.
    locked_at: Instant,
}

/// Refcounted set of output paths with pending self-inflicted writes.
///
/// Shared as `Arc<LockTable>`; all operations take `&self`.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<PathBuf, Entry>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one expected self-inflicted write for `path`.
    ///
    /// Repeated adds for the same path are additive.
    pub fn add(&self, path: impl Into<PathBuf>) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(path.into()).or_insert(Entry {
            count: 0,
            locked_at: Instant::now(),
        });
        entry.count += 1;
        entry.locked_at = Instant::now();
    }

    /// True iff at least one write is still expected for `path`.
    pub fn has_lock(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    /// Release one expected write for `path`.
    ///
    /// Removes the entry entirely when the count reaches zero. Releasing
    /// an unlocked path is a no-op.
    ///
    /// Returns true if a lock was actually released.
    pub fn delete(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(path) {
            Some(entry) => {
                entry.count -= 1;
                if entry.count == 0 {
                    entries.remove(path);
                }
                true
            }
            None => false,
        }
    }

    /// Drop all outstanding locks for `path`, whatever the count.
    ///
    /// Teardown hook for a file being deleted or a handler shutting
    /// down; bounds how long a leaked lock can suppress edits.
    pub fn purge(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    /// Drop all locks under a directory being removed from watch.
    pub fn purge_prefix(&self, dir: &Path) {
        self.entries.lock().retain(|path, _| !path.starts_with(dir));
    }

    /// Number of locked paths.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Paths whose locks have been held longer than `max_age`.
    ///
    /// A hit here means the anticipated write event never arrived (the
    /// write failed, or the watcher missed it). Diagnostic only; the
    /// caller decides whether to purge.
    pub fn stale_paths(&self, max_age: std::time::Duration) -> Vec<PathBuf> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.locked_at) > max_age)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_refcount_add_delete() {
        let table = LockTable::new();
        let path = Path::new("/locales/en.po");

        table.add(path);
        table.add(path);
        assert!(table.has_lock(path));

        // One delete leaves the second add outstanding
        assert!(table.delete(path));
        assert!(table.has_lock(path));

        assert!(table.delete(path));
        assert!(!table.has_lock(path));
        assert!(table.is_empty());
    }

    #[test]
    fn test_delete_unlocked_is_noop() {
        let table = LockTable::new();
        assert!(!table.delete(Path::new("/never/locked.json")));
        assert!(table.is_empty());
    }

    #[test]
    fn test_zero_count_entries_are_absent() {
        let table = LockTable::new();
        let path = Path::new("/locales/fr.json");

        table.add(path);
        table.delete(path);

        // has_lock is defined as presence, so the entry must be gone
        assert!(!table.has_lock(path));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_purge_clears_all_counts() {
        let table = LockTable::new();
        let path = Path::new("/locales/de.json");

        table.add(path);
        table.add(path);
        table.add(path);
        table.purge(path);

        assert!(!table.has_lock(path));
    }

    #[test]
    fn test_purge_prefix() {
        let table = LockTable::new();
        table.add("/proj/locales/en.json");
        table.add("/proj/locales/de.json");
        table.add("/other/en.json");

        table.purge_prefix(Path::new("/proj/locales"));

        assert_eq!(table.len(), 1);
        assert!(table.has_lock(Path::new("/other/en.json")));
    }

    #[test]
    fn test_stale_paths() {
        let table = LockTable::new();
        table.add("/locales/en.json");

        assert!(table.stale_paths(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(table.stale_paths(Duration::from_millis(1)).len(), 1);
    }
}
