//! Extract stage: parse the catalog document and derive its key records.

use async_trait::async_trait;

use crate::catalog::collect_leaf_values;
use crate::config::Settings;
use crate::error::SyncResult;
use crate::pipeline::{ProcessingContext, Stage};

/// Parses `ctx.content` as JSON and populates `ctx.document` and
/// `ctx.keys`.
///
/// A malformed catalog is reported and leaves both fields unset; the
/// chain continues and downstream stages no-op on their missing inputs
/// rather than writing a corrupt derivation.
pub struct ExtractKeys;

#[async_trait]
impl Stage for ExtractKeys {
    fn name(&self) -> &'static str {
        "extract-keys"
    }

    fn enabled(&self, settings: &Settings) -> bool {
        settings.stages.extract_keys
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        let Some(content) = &ctx.content else {
            return Ok(());
        };

        match serde_json::from_str::<serde_json::Value>(content) {
            Ok(document) => {
                ctx.keys = Some(collect_leaf_values(&document));
                ctx.document = Some(document);
                ctx.has_changes = true.into();
            }
            Err(e) => {
                tracing::error!(
                    "[{}] malformed catalog {}: {e}",
                    self.name(),
                    ctx.input_path.display()
                );
            }
        }

        Ok(())
    }
}
