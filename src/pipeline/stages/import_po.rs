//! Import stage: apply an edited PO file back onto its JSON catalog.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{flatten, merge_documents, parse_po, reconstruct_with_updated_values, unflatten};
use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::lock::LockTable;
use crate::pipeline::{ProcessingContext, Stage, locked_write};
use crate::{debug_event, log_event};

/// Parses `ctx.content` as PO and merges the translated entries onto
/// the catalog at `ctx.output_path`, writing under a write lock.
///
/// Untranslated entries (empty `msgstr`) are skipped so an incomplete
/// PO round does not blank out existing catalog values. A malformed PO
/// is reported and produces no write.
pub struct ImportPo {
    locks: Arc<LockTable>,
}

impl ImportPo {
    pub fn new(locks: Arc<LockTable>) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl Stage for ImportPo {
    fn name(&self) -> &'static str {
        "import-po"
    }

    fn enabled(&self, settings: &Settings) -> bool {
        settings.stages.import_po
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        let (Some(content), Some(output)) = (&ctx.content, &ctx.output_path) else {
            return Ok(());
        };

        let entries = match parse_po(content, &ctx.input_path) {
            Ok(entries) => entries,
            Err(e) => {
                // No partial write from a malformed export
                tracing::error!("[{}] {e}", self.name());
                return Ok(());
            }
        };

        let translated: Vec<_> = entries.iter().filter(|e| !e.msgstr.is_empty()).collect();
        if translated.is_empty() {
            debug_event!(self.name(), "nothing translated", "{}", ctx.input_path.display());
            return Ok(());
        }

        let catalog = match tokio::fs::read_to_string(output).await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    // Catalog itself is broken; overwriting would lose the
                    // user's chance to repair it
                    tracing::error!(
                        "[{}] target catalog {} is malformed: {e}",
                        self.name(),
                        output.display()
                    );
                    return Ok(());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
            Err(e) => return Err(SyncError::from_io(output, e)),
        };

        let existing = flatten(&catalog);
        let mut updates: HashMap<String, Value> = HashMap::new();
        let mut appended: Vec<(&str, Value)> = Vec::new();
        for entry in &translated {
            let value = Value::String(entry.msgstr.clone());
            if existing.contains_key(&entry.msgid) {
                updates.insert(entry.msgid.clone(), value);
            } else {
                appended.push((entry.msgid.as_str(), value));
            }
        }

        let mut doc = reconstruct_with_updated_values(&catalog, &updates);
        if !appended.is_empty() {
            doc = merge_documents(doc, unflatten(appended));
        }

        let mut text = serde_json::to_string_pretty(&doc)
            .map_err(|e| SyncError::format(output, e.to_string()))?;
        text.push('\n');
        locked_write(&self.locks, output, &text).await?;

        ctx.has_changes = true.into();
        log_event!(
            self.name(),
            "merged",
            "{} entries into {}",
            translated.len(),
            output.display()
        );
        Ok(())
    }
}
