//! Translate stage: fill missing target-locale values through the
//! machine translation backend.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::TranslationBackend;
use crate::catalog::{flatten, merge_documents, reconstruct_with_updated_values, unflatten};
use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::lock::LockTable;
use crate::pipeline::{ProcessingContext, Stage, locked_write};
use crate::{debug_event, log_event};

/// For each target locale, finds keys present in the source catalog but
/// missing (or empty) in the target catalog, translates their texts in
/// one batch, and writes the updated target catalog under a write lock.
///
/// Only runs when the changed catalog is the source locale. A backend
/// failure aborts this stage for the affected locale; target catalogs
/// already written stay written (at-least-once fan-out, no rollback).
pub struct MachineTranslate {
    settings: Arc<Settings>,
    backend: Arc<dyn TranslationBackend>,
    locks: Arc<LockTable>,
}

impl MachineTranslate {
    pub fn new(
        settings: Arc<Settings>,
        backend: Arc<dyn TranslationBackend>,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            settings,
            backend,
            locks,
        }
    }

    /// Translate and write one target catalog. Returns the number of
    /// filled keys.
    async fn fill_locale(&self, ctx: &ProcessingContext, target: &str) -> SyncResult<usize> {
        let Some(keys) = &ctx.keys else {
            return Ok(0);
        };

        let target_path = self
            .settings
            .locales_root()
            .join(format!("{target}.json"));

        let target_doc = match tokio::fs::read_to_string(&target_path).await {
            Ok(text) => serde_json::from_str::<Value>(&text)
                .map_err(|e| SyncError::format(&target_path, e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
            Err(e) => return Err(SyncError::from_io(&target_path, e)),
        };

        let existing = flatten(&target_doc);

        // A key counts as missing when absent or holding an empty string
        let missing: Vec<_> = keys
            .iter()
            .filter(|record| {
                record.value.is_string()
                    && match existing.get(&record.key) {
                        Some(Value::String(s)) => s.is_empty(),
                        Some(_) => false,
                        None => true,
                    }
            })
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = missing.iter().map(|r| r.text()).collect();
        let translated = self
            .backend
            .translate_batch(&texts, &self.settings.source_locale, target)
            .await?;

        // Update in place where the key exists, append where it does not
        let mut updates: HashMap<String, Value> = HashMap::new();
        let mut appended: Vec<(&str, Value)> = Vec::new();
        for (record, text) in missing.iter().zip(translated) {
            if existing.contains_key(&record.key) {
                updates.insert(record.key.clone(), Value::String(text));
            } else {
                appended.push((record.key.as_str(), Value::String(text)));
            }
        }

        let filled = updates.len() + appended.len();
        let mut doc = reconstruct_with_updated_values(&target_doc, &updates);
        if !appended.is_empty() {
            doc = merge_documents(doc, unflatten(appended));
        }

        let mut text = serde_json::to_string_pretty(&doc)
            .map_err(|e| SyncError::format(&target_path, e.to_string()))?;
        text.push('\n');
        locked_write(&self.locks, &target_path, &text).await?;

        Ok(filled)
    }
}

#[async_trait]
impl Stage for MachineTranslate {
    fn name(&self) -> &'static str {
        "machine-translate"
    }

    fn enabled(&self, settings: &Settings) -> bool {
        settings.stages.machine_translate
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        // Only source-catalog changes fan out to target locales
        if !ctx.is_source_locale(&self.settings) || ctx.keys.is_none() {
            return Ok(());
        }

        for target in &self.settings.target_locales {
            if target == &self.settings.source_locale {
                continue;
            }

            match self.fill_locale(ctx, target).await {
                Ok(0) => debug_event!(self.name(), "up to date", "{target}"),
                Ok(n) => log_event!(self.name(), "filled", "{n} keys for {target}"),
                // Stage-local: the next change event is the retry
                Err(SyncError::Backend { reason }) => {
                    tracing::error!("[{}] backend failed for {target}: {reason}", self.name());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
