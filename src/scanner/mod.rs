//! Code scanner: translation-key usage extraction and the
//! full-vs-incremental scan decision.
//!
//! The scanner keeps the previously extracted key set per source file.
//! A change whose diff only adds or modifies keys in place can be
//! processed incrementally; any removal, deletion, or rename-like diff
//! forces a full scan, because removed keys may still be referenced
//! from files that did not change.

mod extract;

pub use extract::KeyExtractor;

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::types::SourcePosition;
use crate::utils::content_hash;
use crate::{debug_event, log_event};

/// One translation-function call found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsage {
    /// Dot-joined key path passed to the translation function.
    pub key: String,
    /// Authored default text, when the call carries one.
    pub default_text: Option<String>,
    pub position: SourcePosition,
}

impl KeyUsage {
    /// Content used by the rename heuristic: the default text when
    /// present, else the key itself.
    fn content(&self) -> &str {
        self.default_text.as_deref().unwrap_or(&self.key)
    }
}

/// Why a batch escalated to a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScanReason {
    /// A previously extracted key disappeared from the file.
    KeysRemoved,
    /// The file itself is gone.
    FileDeleted,
    /// A removal paired with an addition of equal content.
    RenameSuspected,
}

/// Outcome of diffing a changed file against its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Content hash unchanged; nothing to do.
    Unchanged,
    /// Keys only added or modified in place; per-file processing suffices.
    Incremental,
    /// Global usage must be recomputed from scratch.
    FullScan(FullScanReason),
}

#[derive(Debug, Clone)]
struct FileRecord {
    hash: String,
    usages: Vec<KeyUsage>,
}

/// Totals from a full-repository scan.
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub keys_found: usize,
}

/// Per-file key records with diff-based scan classification.
///
/// Shared as `Arc<CodeScanner>`; the record store sits behind a mutex
/// (spec'd atomic read-modify-write even under cooperative scheduling).
pub struct CodeScanner {
    settings: Arc<Settings>,
    extractor: KeyExtractor,
    records: Mutex<HashMap<PathBuf, FileRecord>>,
}

impl CodeScanner {
    pub fn new(settings: Arc<Settings>) -> Self {
        let extractor = KeyExtractor::new(&settings.code.functions);
        Self {
            settings,
            extractor,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Read and extract one file. Parsing problems are reported and
    /// yield an empty usage list; only I/O failures are errors.
    pub async fn scan_file(&self, path: &Path) -> SyncResult<Vec<KeyUsage>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::from_io(path, e))?;
        Ok(self.extract(path, &content))
    }

    fn extract(&self, path: &Path, content: &str) -> Vec<KeyUsage> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.extractor.extract(content, ext)
    }

    /// Classify a candidate change by diffing fresh usages against the
    /// stored record, then store the fresh record.
    ///
    /// Unified escalation policy: any removed key, or a removal paired
    /// with an addition of equal content, means full scan.
    pub async fn classify_change(&self, path: &Path) -> SyncResult<ScanOutcome> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::from_io(path, e))?;
        let hash = content_hash(&content);

        let previous = {
            let records = self.records.lock();
            records.get(path).cloned()
        };

        if let Some(prev) = &previous
            && prev.hash == hash
        {
            return Ok(ScanOutcome::Unchanged);
        }

        let usages = self.extract(path, &content);
        let outcome = match &previous {
            Some(prev) => diff_usages(&prev.usages, &usages),
            // First sighting: nothing can have been removed
            None => ScanOutcome::Incremental,
        };

        self.records
            .lock()
            .insert(path.to_path_buf(), FileRecord { hash, usages });

        Ok(outcome)
    }

    /// Drop the record for a deleted file. Always escalates.
    pub fn note_deleted(&self, path: &Path) -> ScanOutcome {
        self.records.lock().remove(path);
        ScanOutcome::FullScan(FullScanReason::FileDeleted)
    }

    /// Re-derive every file's record from scratch, replacing the store
    /// wholesale.
    pub async fn full_scan(&self) -> SyncResult<ScanStats> {
        let root = self
            .settings
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let mut stats = ScanStats::default();
        let mut fresh: HashMap<PathBuf, FileRecord> = HashMap::new();

        for path in self.walk_source_files(&root) {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    stats.files_failed += 1;
                    debug_event!("scanner", "unreadable", "{}: {e}", path.display());
                    continue;
                }
            };

            let usages = self.extract(&path, &content);
            stats.files_scanned += 1;
            stats.keys_found += usages.len();
            fresh.insert(
                path,
                FileRecord {
                    hash: content_hash(&content),
                    usages,
                },
            );
        }

        *self.records.lock() = fresh;

        log_event!(
            "scanner",
            "full scan",
            "{} files, {} keys, {} unreadable",
            stats.files_scanned,
            stats.keys_found,
            stats.files_failed
        );

        Ok(stats)
    }

    /// Source files under the configured scan paths, gitignore-aware.
    fn walk_source_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for dir in &self.settings.code.paths {
            let base = if dir.is_absolute() {
                dir.clone()
            } else {
                root.join(dir)
            };
            if !base.exists() {
                continue;
            }

            for entry in WalkBuilder::new(&base).build().flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                if self
                    .settings
                    .code
                    .extensions
                    .iter()
                    .any(|e| e.eq_ignore_ascii_case(ext))
                    && !self.is_ignored(path)
                {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.settings.code.ignore_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&text))
                .unwrap_or(false)
        })
    }

    /// Every key currently used anywhere in scanned code.
    pub fn used_keys(&self) -> HashSet<String> {
        self.records
            .lock()
            .values()
            .flat_map(|r| r.usages.iter().map(|u| u.key.clone()))
            .collect()
    }

    /// Keys used in code but absent from `catalog_keys`.
    pub fn missing_keys(&self, catalog_keys: &HashSet<String>) -> Vec<String> {
        let mut missing: Vec<String> = self
            .used_keys()
            .into_iter()
            .filter(|k| !catalog_keys.contains(k))
            .collect();
        missing.sort();
        missing
    }

    /// Authored default texts by key, where calls carried one.
    ///
    /// When the same key appears with different defaults, the first one
    /// encountered wins.
    pub fn default_texts(&self) -> HashMap<String, String> {
        let mut texts = HashMap::new();
        for record in self.records.lock().values() {
            for usage in &record.usages {
                if let Some(text) = &usage.default_text {
                    texts.entry(usage.key.clone()).or_insert_with(|| text.clone());
                }
            }
        }
        texts
    }

    /// Catalog keys never referenced from scanned code.
    pub fn unused_keys(&self, catalog_keys: &HashSet<String>) -> Vec<String> {
        let used = self.used_keys();
        let mut unused: Vec<String> = catalog_keys
            .iter()
            .filter(|k| !used.contains(*k))
            .cloned()
            .collect();
        unused.sort();
        unused
    }

    /// Number of files with stored records.
    pub fn tracked_files(&self) -> usize {
        self.records.lock().len()
    }
}

/// Diff two usage sets into a scan outcome.
fn diff_usages(old: &[KeyUsage], new: &[KeyUsage]) -> ScanOutcome {
    let old_keys: HashSet<&str> = old.iter().map(|u| u.key.as_str()).collect();
    let new_keys: HashSet<&str> = new.iter().map(|u| u.key.as_str()).collect();

    let removed: Vec<&KeyUsage> = old
        .iter()
        .filter(|u| !new_keys.contains(u.key.as_str()))
        .collect();

    if removed.is_empty() {
        return ScanOutcome::Incremental;
    }

    let added_content: HashSet<&str> = new
        .iter()
        .filter(|u| !old_keys.contains(u.key.as_str()))
        .map(|u| u.content())
        .collect();

    if removed.iter().any(|u| added_content.contains(u.content())) {
        ScanOutcome::FullScan(FullScanReason::RenameSuspected)
    } else {
        ScanOutcome::FullScan(FullScanReason::KeysRemoved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(key: &str) -> KeyUsage {
        KeyUsage {
            key: key.to_string(),
            default_text: None,
            position: SourcePosition::new(1, 0),
        }
    }

    fn usage_with_text(key: &str, text: &str) -> KeyUsage {
        KeyUsage {
            default_text: Some(text.to_string()),
            ..usage(key)
        }
    }

    #[test]
    fn test_diff_added_key_is_incremental() {
        let old = vec![usage("a")];
        let new = vec![usage("a"), usage("b")];
        assert_eq!(diff_usages(&old, &new), ScanOutcome::Incremental);
    }

    #[test]
    fn test_diff_removed_key_escalates() {
        let old = vec![usage("a"), usage("b")];
        let new = vec![usage("a")];
        assert_eq!(
            diff_usages(&old, &new),
            ScanOutcome::FullScan(FullScanReason::KeysRemoved)
        );
    }

    #[test]
    fn test_diff_rename_detected_by_content() {
        // Key renamed but the authored text carried over
        let old = vec![usage_with_text("old.key", "Hello")];
        let new = vec![usage_with_text("new.key", "Hello")];
        assert_eq!(
            diff_usages(&old, &new),
            ScanOutcome::FullScan(FullScanReason::RenameSuspected)
        );
    }

    #[test]
    fn test_diff_unrelated_swap_is_plain_removal() {
        let old = vec![usage_with_text("old.key", "Hello")];
        let new = vec![usage_with_text("new.key", "Goodbye")];
        assert_eq!(
            diff_usages(&old, &new),
            ScanOutcome::FullScan(FullScanReason::KeysRemoved)
        );
    }

    #[tokio::test]
    async fn test_classify_and_delete_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.js");
        tokio::fs::write(&file, "t('a');").await.unwrap();

        let scanner = CodeScanner::new(Arc::new(Settings::default()));

        // First sighting is incremental
        assert_eq!(
            scanner.classify_change(&file).await.unwrap(),
            ScanOutcome::Incremental
        );

        // Unchanged content short-circuits on the hash
        assert_eq!(
            scanner.classify_change(&file).await.unwrap(),
            ScanOutcome::Unchanged
        );

        // Adding a key stays incremental
        tokio::fs::write(&file, "t('a'); t('b');").await.unwrap();
        assert_eq!(
            scanner.classify_change(&file).await.unwrap(),
            ScanOutcome::Incremental
        );

        // Removing a key escalates
        tokio::fs::write(&file, "t('b');").await.unwrap();
        assert_eq!(
            scanner.classify_change(&file).await.unwrap(),
            ScanOutcome::FullScan(FullScanReason::KeysRemoved)
        );

        // Deletion always escalates and drops the record
        assert_eq!(
            scanner.note_deleted(&file),
            ScanOutcome::FullScan(FullScanReason::FileDeleted)
        );
        assert_eq!(scanner.tracked_files(), 0);
    }

    #[tokio::test]
    async fn test_full_scan_replaces_store() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        tokio::fs::write(src.join("a.js"), "t('x.one');")
            .await
            .unwrap();
        tokio::fs::write(src.join("b.ts"), "t('x.two'); t('x.three');")
            .await
            .unwrap();
        tokio::fs::write(src.join("notes.txt"), "t('not.scanned')")
            .await
            .unwrap();

        let settings = Settings {
            project_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let scanner = CodeScanner::new(Arc::new(settings));

        let stats = scanner.full_scan().await.unwrap();
        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.keys_found, 3);
        assert_eq!(scanner.tracked_files(), 2);

        let used = scanner.used_keys();
        assert!(used.contains("x.one"));
        assert!(used.contains("x.three"));
        assert!(!used.contains("not.scanned"));
    }
}
