//! Change router: classifies watch events, guards against self-writes,
//! and turns debounced batches into chain runs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::lock::LockTable;
use crate::pipeline::{ChainRegistry, ProcessingContext};
use crate::scanner::{CodeScanner, ScanOutcome};
use crate::types::FileCategory;
use crate::utils::content_hash;
use crate::{debug_event, log_event};

use super::debouncer::Debouncer;

/// Entry point from filesystem-watch callbacks.
///
/// Dispatch order: classify → lock check → debounce → (at flush) chain
/// run. Locks for derived writes are taken by the stages themselves,
/// immediately before each write is issued and therefore strictly
/// before the watcher can observe it; the router's half of the contract
/// is consuming exactly one lock per observed self-write event.
pub struct ChangeRouter {
    settings: Arc<Settings>,
    locks: Arc<LockTable>,
    registry: Arc<ChainRegistry>,
    scanner: Arc<CodeScanner>,
    debouncer: Mutex<Debouncer>,
    /// Content hash per catalog/po path as of its last successful chain
    /// run, to skip events that changed no bytes. Failed runs leave the
    /// old hash in place so a re-delivered event retries.
    hashes: Mutex<HashMap<PathBuf, String>>,
}

impl ChangeRouter {
    pub fn new(
        settings: Arc<Settings>,
        locks: Arc<LockTable>,
        registry: Arc<ChainRegistry>,
        scanner: Arc<CodeScanner>,
    ) -> Self {
        let debouncer = Debouncer::new(settings.watch.debounce_ms);
        Self {
            settings,
            locks,
            registry,
            scanner,
            debouncer: Mutex::new(debouncer),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    /// Handle a create/modify notification.
    pub fn handle_change(&self, path: &Path) {
        let Some(category) = FileCategory::classify(path, &self.settings) else {
            return;
        };

        // A locked path means this event is the write we made ourselves:
        // consume the lock instead of dispatching.
        if self.locks.has_lock(path) {
            self.locks.delete(path);
            debug_event!("router", "suppressed self-write", "{}", path.display());
            return;
        }

        self.debouncer.lock().record(category, path.to_path_buf());
    }

    /// Handle a removal notification.
    ///
    /// The dead path still enters the pending set; the flush decision
    /// checks existence and escalates where required. Any locks and
    /// cached hashes for it are torn down now.
    pub fn handle_removal(&self, path: &Path) {
        let Some(category) = FileCategory::classify(path, &self.settings) else {
            return;
        };

        self.locks.purge(path);
        self.hashes.lock().remove(path);
        self.debouncer.lock().record(category, path.to_path_buf());
    }

    /// Drain scopes whose quiet window elapsed and run their batches.
    ///
    /// Single-flight per scope: the debouncer keeps a draining scope
    /// closed until the batch resolves here.
    pub async fn flush_ready(&self) {
        let ready = self.debouncer.lock().take_ready();

        for (category, paths) in ready {
            self.process_batch(category, &paths).await;
            self.debouncer.lock().finish_flush(category);
        }
    }

    async fn process_batch(&self, category: FileCategory, paths: &[PathBuf]) {
        match category {
            FileCategory::SourceCode => self.process_source_batch(paths).await,
            FileCategory::LocaleJson | FileCategory::Po => {
                self.process_asset_batch(category, paths).await
            }
        }
    }

    /// Source batches: one deleted member escalates the whole batch to
    /// a full scan and abandons per-file processing.
    async fn process_source_batch(&self, paths: &[PathBuf]) {
        if let Some(gone) = paths.iter().find(|p| !p.exists()) {
            log_event!("router", "batch escalated", "{} deleted", gone.display());
            let _ = self.run_chain(FileCategory::SourceCode, gone).await;
            return;
        }

        for path in paths {
            let outcome = self.run_chain(FileCategory::SourceCode, path).await;
            // A full scan already covered every remaining member
            if matches!(outcome, Ok(Some(ScanOutcome::FullScan(_)))) {
                debug_event!("router", "batch superseded by full scan");
                break;
            }
        }
    }

    async fn process_asset_batch(&self, category: FileCategory, paths: &[PathBuf]) {
        for path in paths {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    let hash = content_hash(&content);
                    if self.hashes.lock().get(path.as_path()) == Some(&hash) {
                        debug_event!("router", "unchanged (hash match)", "{}", path.display());
                        continue;
                    }
                    // Record the hash only once the chain succeeded, so a
                    // re-delivered event after a failure is not skipped
                    if self.run_chain(category, path).await.is_ok() {
                        self.hashes.lock().insert(path.clone(), hash);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Deleted while pending; nothing to derive from it
                    debug_event!("router", "pending path gone", "{}", path.display());
                }
                Err(e) => {
                    tracing::error!("[router] cannot read {}: {e}", path.display());
                }
            }
        }
    }

    /// Run one chain on a fresh context. Errors are surfaced, never
    /// retried; the next change event is the retry.
    async fn run_chain(&self, category: FileCategory, path: &Path) -> SyncResult<Option<ScanOutcome>> {
        let mut ctx = ProcessingContext::for_event(path, category, &self.settings);

        match self.registry.run(category, &mut ctx).await {
            Ok(()) => Ok(ctx.scan_outcome),
            Err(SyncError::NotFound { path }) => {
                debug_event!("router", "input vanished mid-chain", "{}", path.display());
                Ok(ctx.scan_outcome)
            }
            Err(e) => {
                tracing::error!("[router] chain failed for {}: {e}", path.display());
                Err(e)
            }
        }
    }

    /// Report and purge locks whose anticipated write never arrived.
    ///
    /// A leaked lock would suppress legitimate edits forever; this
    /// bounds that to the configured stale window.
    pub fn sweep_stale_locks(&self) {
        let max_age = Duration::from_secs(self.settings.watch.lock_stale_secs);
        for path in self.locks.stale_paths(max_age) {
            tracing::warn!("{}", SyncError::LockLeak { path: path.clone() });
            self.locks.purge(&path);
        }
    }

    /// Pending count for one scope, for tests and status output.
    pub fn pending_count(&self, scope: FileCategory) -> usize {
        self.debouncer.lock().pending_count(scope)
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;

    fn router_for(dir: &Path) -> ChangeRouter {
        let settings = Arc::new(Settings {
            project_root: Some(dir.to_path_buf()),
            watch: crate::config::WatchConfig {
                debounce_ms: 0,
                ..Default::default()
            },
            ..Settings::default()
        });
        let locks = Arc::new(LockTable::new());
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let registry = Arc::new(ChainRegistry::standard(
            settings.clone(),
            locks.clone(),
            scanner.clone(),
            Arc::new(NullBackend),
        ));
        ChangeRouter::new(settings, locks, registry, scanner)
    }

    #[tokio::test]
    async fn test_locked_event_is_consumed_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("locales"))
            .await
            .unwrap();
        let router = router_for(dir.path());
        let path = dir.path().join("locales/de.po");

        router.locks().add(&path);
        router.handle_change(&path);

        // Event swallowed, lock released
        assert_eq!(router.pending_count(FileCategory::Po), 0);
        assert!(!router.locks().has_lock(&path));

        // The next event for the same path is a real user edit
        router.handle_change(&path);
        assert_eq!(router.pending_count(FileCategory::Po), 1);
    }

    #[tokio::test]
    async fn test_overlapping_locks_need_two_events() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("locales"))
            .await
            .unwrap();
        let router = router_for(dir.path());
        let path = dir.path().join("locales/en.json");

        // Two in-flight writes to the same output
        router.locks().add(&path);
        router.locks().add(&path);

        router.handle_change(&path);
        assert!(router.locks().has_lock(&path));
        router.handle_change(&path);
        assert!(!router.locks().has_lock(&path));
        assert_eq!(router.pending_count(FileCategory::LocaleJson), 0);
    }

    #[tokio::test]
    async fn test_unclassified_paths_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_for(dir.path());

        router.handle_change(&dir.path().join("README.md"));
        router.handle_change(&dir.path().join("package.json"));

        assert_eq!(router.pending_count(FileCategory::LocaleJson), 0);
        assert_eq!(router.pending_count(FileCategory::SourceCode), 0);
    }

    #[tokio::test]
    async fn test_flush_runs_locale_chain_and_locks_output() {
        let dir = tempfile::tempdir().unwrap();
        let locales = dir.path().join("locales");
        tokio::fs::create_dir_all(&locales).await.unwrap();
        let catalog = locales.join("de.json");
        tokio::fs::write(&catalog, r#"{"a":"Wert"}"#).await.unwrap();

        let router = router_for(dir.path());
        router.handle_change(&catalog);
        router.flush_ready().await;

        // The chain exported de.po and left its lock pending
        let po = locales.join("de.po");
        assert!(po.exists());
        assert!(router.locks().has_lock(&po));

        // The watcher now reports the write; the router consumes it
        router.handle_change(&po);
        assert!(!router.locks().has_lock(&po));
        assert_eq!(router.pending_count(FileCategory::Po), 0);
    }

    #[tokio::test]
    async fn test_unchanged_content_skips_reprocessing() {
        let dir = tempfile::tempdir().unwrap();
        let locales = dir.path().join("locales");
        tokio::fs::create_dir_all(&locales).await.unwrap();
        let catalog = locales.join("en.json");
        tokio::fs::write(&catalog, r#"{"a":"x"}"#).await.unwrap();

        let router = router_for(dir.path());
        router.handle_change(&catalog);
        router.flush_ready().await;

        let po = locales.join("en.po");
        let first_write = tokio::fs::metadata(&po).await.unwrap().modified().unwrap();
        // Consume the self-write event
        router.handle_change(&po);

        // Same bytes again: no new derivation
        router.handle_change(&catalog);
        router.flush_ready().await;
        assert!(!router.locks().has_lock(&po));
        let second = tokio::fs::metadata(&po).await.unwrap().modified().unwrap();
        assert_eq!(first_write, second);
    }

    #[tokio::test]
    async fn test_failed_derivation_retries_on_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let locales = dir.path().join("locales");
        tokio::fs::create_dir_all(&locales).await.unwrap();
        let catalog = locales.join("de.json");
        tokio::fs::write(&catalog, r#"{"a":"Wert"}"#).await.unwrap();
        // Block the export target with a directory of the same name
        let po = locales.join("de.po");
        tokio::fs::create_dir_all(&po).await.unwrap();

        let router = router_for(dir.path());
        router.handle_change(&catalog);
        router.flush_ready().await;
        // Export failed; the failed write must not hold a lock
        assert!(po.is_dir());
        assert!(!router.locks().has_lock(&po));

        // With the obstruction gone, the same bytes must derive again
        tokio::fs::remove_dir(&po).await.unwrap();
        router.handle_change(&catalog);
        router.flush_ready().await;
        assert!(po.is_file());
        assert!(router.locks().has_lock(&po));
    }

    #[tokio::test]
    async fn test_deleted_source_escalates_batch() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        let kept = src.join("kept.js");
        tokio::fs::write(&kept, "t('kept.key');").await.unwrap();
        let doomed = src.join("doomed.js");
        tokio::fs::write(&doomed, "t('doomed.key');").await.unwrap();

        let router = router_for(dir.path());
        // Seed the scanner with both files
        router.scanner.full_scan().await.unwrap();
        assert_eq!(router.scanner.tracked_files(), 2);

        // Both queued, one deleted before the flush
        router.handle_change(&kept);
        router.handle_change(&doomed);
        tokio::fs::remove_file(&doomed).await.unwrap();
        router.handle_removal(&doomed);

        router.flush_ready().await;

        // Full scan replaced the store; the dead file is gone from it
        assert_eq!(router.scanner.tracked_files(), 1);
        assert!(router.scanner.used_keys().contains("kept.key"));
        assert!(!router.scanner.used_keys().contains("doomed.key"));
    }

    #[tokio::test]
    async fn test_stale_lock_sweep_purges() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(Settings {
            project_root: Some(dir.path().to_path_buf()),
            watch: crate::config::WatchConfig {
                lock_stale_secs: 0,
                ..Default::default()
            },
            ..Settings::default()
        });
        let locks = Arc::new(LockTable::new());
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let registry = Arc::new(ChainRegistry::standard(
            settings.clone(),
            locks.clone(),
            scanner.clone(),
            Arc::new(NullBackend),
        ));
        let router = ChangeRouter::new(settings, locks.clone(), registry, scanner);

        locks.add(dir.path().join("locales/en.po"));
        std::thread::sleep(Duration::from_millis(5));
        router.sweep_stale_locks();
        assert!(locks.is_empty());
    }
}
