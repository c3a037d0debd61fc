//! Asset watcher: one `notify::RecommendedWatcher` over the locale
//! directory and the configured code paths, feeding the change router.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

use crate::backend::{HttpBackend, NullBackend, TranslationBackend};
use crate::config::Settings;
use crate::lock::LockTable;
use crate::pipeline::ChainRegistry;
use crate::scanner::CodeScanner;

use super::error::WatchError;
use super::router::ChangeRouter;

/// Filesystem watcher over translation assets.
///
/// Owns the notify watcher and the event loop; all classification and
/// processing decisions live in the [`ChangeRouter`].
pub struct AssetWatcher {
    settings: Arc<Settings>,
    router: Arc<ChangeRouter>,
    scanner: Arc<CodeScanner>,
    /// Channel for receiving file events.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher.
    _watcher: notify::RecommendedWatcher,
}

impl AssetWatcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> AssetWatcherBuilder {
        AssetWatcherBuilder::new()
    }

    /// The scanner shared with the source-code chain, for seeding a
    /// full scan before watching starts.
    pub fn scanner(&self) -> Arc<CodeScanner> {
        self.scanner.clone()
    }

    pub fn router(&self) -> Arc<ChangeRouter> {
        self.router.clone()
    }

    /// Start watching for file changes.
    ///
    /// The main event loop:
    /// 1. Receives file events from notify
    /// 2. Routes them through lock suppression into the debouncer
    /// 3. Flushes elapsed quiet windows on a periodic tick
    /// 4. Sweeps stale write locks
    pub async fn watch(mut self) -> Result<(), WatchError> {
        let locales_root = self.settings.locales_root();
        let project_root = self
            .settings
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let code_dirs: Vec<PathBuf> = self
            .settings
            .code
            .paths
            .iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir.clone()
                } else {
                    project_root.join(dir)
                }
            })
            .collect();

        self.watch_directory(&locales_root)?;
        for dir in code_dirs {
            self.watch_directory(&dir)?;
        }

        crate::log_event!("watcher", "started", "{}", locales_root.display());

        loop {
            // Periodic check for elapsed quiet windows
            let timeout = sleep(Duration::from_millis(self.settings.watch.tick_ms));
            tokio::pin!(timeout);

            tokio::select! {
                // Handle incoming file events
                event = self.event_rx.recv() => {
                    match event {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => {
                            tracing::error!("[watcher] file watch error: {e}");
                        }
                        None => return Err(WatchError::ChannelClosed),
                    }
                }

                // Flush debounced changes
                _ = &mut timeout => {
                    self.router.flush_ready().await;
                    self.router.sweep_stale_locks();
                }
            }
        }
    }

    /// Watch a directory for changes.
    fn watch_directory(&mut self, dir: &Path) -> Result<(), WatchError> {
        match self._watcher.watch(dir, RecursiveMode::Recursive) {
            Ok(_) => {
                crate::debug_event!("watcher", "watching", "{}", dir.display());
                Ok(())
            }
            Err(e) => {
                // Continue - a missing code path must not stop the watcher
                tracing::warn!("[watcher] failed to watch {}: {e}", dir.display());
                Ok(())
            }
        }
    }

    /// Route an incoming file event.
    fn handle_event(&self, event: Event) {
        for path in event.paths {
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    self.router.handle_change(&path);
                }
                EventKind::Remove(_) => {
                    self.router.handle_removal(&path);
                }
                _ => {}
            }
        }
    }
}

/// Builder for constructing an AssetWatcher.
pub struct AssetWatcherBuilder {
    settings: Option<Arc<Settings>>,
    backend: Option<Arc<dyn TranslationBackend>>,
    locks: Option<Arc<LockTable>>,
}

impl AssetWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            settings: None,
            backend: None,
            locks: None,
        }
    }

    /// Set the settings (required).
    pub fn settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Override the translation backend. By default the configured
    /// HTTP backend is used when machine translation is enabled, else
    /// a no-op backend.
    pub fn backend(mut self, backend: Arc<dyn TranslationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share an externally owned lock table.
    pub fn locks(mut self, locks: Arc<LockTable>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Build the AssetWatcher.
    pub fn build(self) -> Result<AssetWatcher, WatchError> {
        let settings = self.settings.ok_or_else(|| WatchError::InitFailed {
            reason: "Settings are required".to_string(),
        })?;

        let backend = self.backend.unwrap_or_else(|| {
            if settings.stages.machine_translate {
                Arc::new(HttpBackend::new(settings.backend.clone()))
            } else {
                Arc::new(NullBackend)
            }
        });

        let locks = self.locks.unwrap_or_default();
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let registry = Arc::new(ChainRegistry::standard(
            settings.clone(),
            locks.clone(),
            scanner.clone(),
            backend,
        ));
        let router = Arc::new(ChangeRouter::new(
            settings.clone(),
            locks,
            registry,
            scanner.clone(),
        ));

        // Create channel for events
        let (tx, rx) = mpsc::channel(100);

        // Create the notify watcher
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(AssetWatcher {
            settings,
            router,
            scanner,
            event_rx: rx,
            _watcher: watcher,
        })
    }
}

impl Default for AssetWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
