//! Chain-of-responsibility processing pipeline.
//!
//! One chain per file category, built once at startup:
//!
//! ```text
//! locale-json: ReadSource → ExtractKeys → MachineTranslate → ExportPo
//! po:          ReadSource → ImportPo
//! source-code: ScanCode → UpdateCatalogs
//! ```
//!
//! Stages run strictly sequentially; later stages depend on context
//! fields only earlier stages populate. A disabled or
//! precondition-failed stage no-ops silently. A stage error stops the
//! chain: the successor runs only after its predecessor succeeded.

pub mod context;
pub mod stages;

pub use context::ProcessingContext;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

use crate::backend::TranslationBackend;
use crate::config::Settings;
use crate::debug_event;
use crate::error::SyncResult;
use crate::lock::LockTable;
use crate::scanner::CodeScanner;
use crate::types::FileCategory;

/// One unit of transformation in a chain.
///
/// `enabled` is the configuration half of the stage's precondition and
/// is re-read per execution; data preconditions (fields an earlier
/// stage should have populated) are checked inside `apply`, which
/// no-ops cleanly when they fail.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for logging and spans.
    fn name(&self) -> &'static str;

    /// Configuration precondition, checked at execution time.
    fn enabled(&self, _settings: &Settings) -> bool {
        true
    }

    /// Run this stage's transformation against the context.
    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()>;
}

/// Registry of one built chain per file category.
///
/// Chains are immutable once built; per-stage enablement is checked at
/// execution time, never by restructuring a chain.
pub struct ChainRegistry {
    settings: Arc<Settings>,
    chains: HashMap<FileCategory, Vec<Arc<dyn Stage>>>,
}

impl ChainRegistry {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            chains: HashMap::new(),
        }
    }

    /// Build the standard three chains with their shared services.
    pub fn standard(
        settings: Arc<Settings>,
        locks: Arc<LockTable>,
        scanner: Arc<CodeScanner>,
        backend: Arc<dyn TranslationBackend>,
    ) -> Self {
        use stages::{
            ExportPo, ExtractKeys, ImportPo, MachineTranslate, ReadSource, ScanCode,
            UpdateCatalogs,
        };

        let mut registry = Self::new(settings.clone());

        registry.register(
            FileCategory::LocaleJson,
            vec![
                Arc::new(ReadSource),
                Arc::new(ExtractKeys),
                Arc::new(MachineTranslate::new(
                    settings.clone(),
                    backend,
                    locks.clone(),
                )),
                Arc::new(ExportPo::new(locks.clone())),
            ],
        );

        registry.register(
            FileCategory::Po,
            vec![Arc::new(ReadSource), Arc::new(ImportPo::new(locks.clone()))],
        );

        registry.register(
            FileCategory::SourceCode,
            vec![
                Arc::new(ScanCode::new(scanner.clone())),
                Arc::new(UpdateCatalogs::new(settings, scanner, locks)),
            ],
        );

        registry
    }

    /// Install the chain for a category. Chains are built once at
    /// startup; re-registering replaces wholesale.
    pub fn register(&mut self, category: FileCategory, chain: Vec<Arc<dyn Stage>>) {
        self.chains.insert(category, chain);
    }

    /// Execute the chain for `category` against `ctx`.
    ///
    /// Each stage's `apply` runs inside a span with error capture. The
    /// first stage error stops the chain after being surfaced.
    pub async fn run(&self, category: FileCategory, ctx: &mut ProcessingContext) -> SyncResult<()> {
        let Some(chain) = self.chains.get(&category) else {
            debug_event!("pipeline", "no chain registered", "{}", category.name());
            return Ok(());
        };

        for stage in chain {
            if !stage.enabled(&self.settings) {
                debug_event!(stage.name(), "disabled, skipping");
                continue;
            }

            let span = tracing::debug_span!(
                "stage",
                chain = category.name(),
                stage = stage.name(),
                input = %ctx.input_path.display()
            );

            if let Err(e) = stage.apply(ctx).instrument(span).await {
                tracing::error!("[{}] stage failed: {e}", stage.name());
                return Err(e);
            }
        }

        Ok(())
    }

    /// Stage names registered for a category, in execution order.
    pub fn stage_names(&self, category: FileCategory) -> Vec<&'static str> {
        self.chains
            .get(&category)
            .map(|chain| chain.iter().map(|s| s.name()).collect())
            .unwrap_or_default()
    }
}

/// Add a write lock for `path`, then write, releasing the lock again if
/// the write itself failed (the watcher will never see that event).
///
/// Lock-before-write is mandatory: locking after the write races the
/// filesystem watcher.
pub(crate) async fn locked_write(
    locks: &LockTable,
    path: &std::path::Path,
    content: &str,
) -> SyncResult<()> {
    locks.add(path);
    match tokio::fs::write(path, content).await {
        Ok(()) => Ok(()),
        Err(e) => {
            locks.delete(path);
            Err(crate::error::SyncError::from_io(path, e))
        }
    }
}
