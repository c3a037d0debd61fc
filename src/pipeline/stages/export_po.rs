//! Export stage: write the PO rendition of a changed catalog.

use async_trait::async_trait;
use std::sync::Arc;

use crate::catalog::{PoEntry, render_po};
use crate::config::Settings;
use crate::error::SyncResult;
use crate::lock::LockTable;
use crate::log_event;
use crate::pipeline::{ProcessingContext, Stage, locked_write};

/// Renders `ctx.keys` as a PO document and writes it to
/// `ctx.output_path` under a write lock.
///
/// No-ops when an earlier stage failed to produce keys or when no
/// output path was derived for this run.
pub struct ExportPo {
    locks: Arc<LockTable>,
}

impl ExportPo {
    pub fn new(locks: Arc<LockTable>) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl Stage for ExportPo {
    fn name(&self) -> &'static str {
        "export-po"
    }

    fn enabled(&self, settings: &Settings) -> bool {
        settings.stages.export_po
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        let (Some(keys), Some(output)) = (&ctx.keys, &ctx.output_path) else {
            return Ok(());
        };

        let entries: Vec<PoEntry> = keys
            .iter()
            .map(|record| PoEntry {
                msgid: record.key.clone(),
                msgstr: record.text(),
            })
            .collect();

        let locale = ctx.locale.as_deref().unwrap_or_default();
        let text = render_po(&entries, locale);
        locked_write(&self.locks, output, &text).await?;

        log_event!(
            self.name(),
            "wrote",
            "{} ({} entries)",
            output.display(),
            entries.len()
        );
        Ok(())
    }
}
