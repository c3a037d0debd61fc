//! Update stage: add keys newly used in code to the source catalog.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{flatten, merge_documents, unflatten};
use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::lock::LockTable;
use crate::pipeline::{ProcessingContext, Stage, locked_write};
use crate::scanner::CodeScanner;
use crate::{debug_event, log_event};

/// Appends keys the scanner saw in code but the source-locale catalog
/// lacks, using the call's authored default text where one exists and
/// an empty string otherwise. Writes under a write lock; the resulting
/// catalog event then flows through the locale-json chain with the
/// lock suppressing re-entry.
pub struct UpdateCatalogs {
    settings: Arc<Settings>,
    scanner: Arc<CodeScanner>,
    locks: Arc<LockTable>,
}

impl UpdateCatalogs {
    pub fn new(settings: Arc<Settings>, scanner: Arc<CodeScanner>, locks: Arc<LockTable>) -> Self {
        Self {
            settings,
            scanner,
            locks,
        }
    }
}

#[async_trait]
impl Stage for UpdateCatalogs {
    fn name(&self) -> &'static str {
        "update-catalogs"
    }

    fn enabled(&self, settings: &Settings) -> bool {
        settings.stages.update_catalogs
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        // Only act after the scan stage found something to do
        if ctx.scan_outcome.is_none() || !ctx.has_changes.is_true() {
            return Ok(());
        }
        let Some(catalog_path) = &ctx.output_path else {
            return Ok(());
        };

        let catalog = match tokio::fs::read_to_string(catalog_path).await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::error!(
                        "[{}] source catalog {} is malformed: {e}",
                        self.name(),
                        catalog_path.display()
                    );
                    return Ok(());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
            Err(e) => return Err(SyncError::from_io(catalog_path, e)),
        };

        let catalog_keys: HashSet<String> = flatten(&catalog).into_keys().collect();
        let missing = self.scanner.missing_keys(&catalog_keys);
        if missing.is_empty() {
            debug_event!(self.name(), "catalog already has every used key");
            return Ok(());
        }

        let defaults = self.scanner.default_texts();
        let additions: Vec<(&str, Value)> = missing
            .iter()
            .map(|key| {
                let value = defaults.get(key).cloned().unwrap_or_default();
                (key.as_str(), Value::String(value))
            })
            .collect();

        let doc = merge_documents(catalog, unflatten(additions));
        let mut text = serde_json::to_string_pretty(&doc)
            .map_err(|e| SyncError::format(catalog_path, e.to_string()))?;
        text.push('\n');
        locked_write(&self.locks, catalog_path, &text).await?;

        log_event!(
            self.name(),
            "added",
            "{} keys to {}",
            missing.len(),
            catalog_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanOutcome;
    use crate::types::FileCategory;

    async fn fixture(dir: &std::path::Path) -> (Arc<Settings>, Arc<CodeScanner>) {
        let src = dir.join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        tokio::fs::create_dir_all(dir.join("locales")).await.unwrap();
        tokio::fs::write(
            src.join("app.js"),
            "t('existing.key'); t('brand.new', 'Brand new'); t('no.default');",
        )
        .await
        .unwrap();

        let settings = Arc::new(Settings {
            project_root: Some(dir.to_path_buf()),
            ..Settings::default()
        });
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        scanner.full_scan().await.unwrap();
        (settings, scanner)
    }

    #[tokio::test]
    async fn test_adds_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, scanner) = fixture(dir.path()).await;
        let catalog_path = dir.path().join("locales/en.json");
        tokio::fs::write(&catalog_path, r#"{"existing":{"key":"Here"}}"#)
            .await
            .unwrap();

        let locks = Arc::new(LockTable::new());
        let stage = UpdateCatalogs::new(settings.clone(), scanner, locks.clone());

        let mut ctx = ProcessingContext::for_event(
            &dir.path().join("src/app.js"),
            FileCategory::SourceCode,
            &settings,
        );
        ctx.scan_outcome = Some(ScanOutcome::Incremental);
        ctx.has_changes = true.into();

        stage.apply(&mut ctx).await.unwrap();

        let written = tokio::fs::read_to_string(&catalog_path).await.unwrap();
        let doc: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(doc["existing"]["key"], "Here");
        assert_eq!(doc["brand"]["new"], "Brand new");
        assert_eq!(doc["no"]["default"], "");
        assert!(locks.has_lock(&catalog_path));
    }

    #[tokio::test]
    async fn test_unchanged_scan_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, scanner) = fixture(dir.path()).await;
        let catalog_path = dir.path().join("locales/en.json");

        let stage = UpdateCatalogs::new(settings.clone(), scanner, Arc::new(LockTable::new()));

        let mut ctx = ProcessingContext::for_event(
            &dir.path().join("src/app.js"),
            FileCategory::SourceCode,
            &settings,
        );
        ctx.scan_outcome = Some(ScanOutcome::Unchanged);
        ctx.has_changes = false.into();

        stage.apply(&mut ctx).await.unwrap();
        assert!(!catalog_path.exists());
    }
}
