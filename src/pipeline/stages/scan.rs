//! Scan stage: classify a source-code change and recompute usage.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::pipeline::{ProcessingContext, Stage};
use crate::scanner::{CodeScanner, FullScanReason, ScanOutcome};
use crate::{debug_event, log_event};

/// Diffs the changed file's key usage against its stored record and
/// either updates that record in place or re-derives the whole
/// project's usage, per the escalation policy.
pub struct ScanCode {
    scanner: Arc<CodeScanner>,
}

impl ScanCode {
    pub fn new(scanner: Arc<CodeScanner>) -> Self {
        Self { scanner }
    }
}

#[async_trait]
impl Stage for ScanCode {
    fn name(&self) -> &'static str {
        "scan-code"
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        let outcome = match self.scanner.classify_change(&ctx.input_path).await {
            Ok(outcome) => outcome,
            // Vanished between flush and scan: same as a delete event
            Err(SyncError::NotFound { .. }) => self.scanner.note_deleted(&ctx.input_path),
            Err(e) => return Err(e),
        };

        ctx.scan_outcome = Some(outcome);
        match outcome {
            ScanOutcome::Unchanged => {
                ctx.has_changes = false.into();
                debug_event!(self.name(), "unchanged (hash match)");
            }
            ScanOutcome::Incremental => {
                ctx.has_changes = true.into();
                ctx.has_deletions = false.into();
                ctx.has_renames = false.into();
            }
            ScanOutcome::FullScan(reason) => {
                ctx.has_changes = true.into();
                ctx.has_deletions =
                    matches!(reason, FullScanReason::KeysRemoved | FullScanReason::FileDeleted)
                        .into();
                ctx.has_renames = matches!(reason, FullScanReason::RenameSuspected).into();

                log_event!(self.name(), "full scan", "{reason:?}");
                self.scanner.full_scan().await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::types::{FileCategory, TriState};

    #[tokio::test]
    async fn test_scan_sets_flags_and_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        tokio::fs::create_dir_all(&src).await.unwrap();
        let file = src.join("app.js");
        tokio::fs::write(&file, "t('a'); t('b');").await.unwrap();

        let settings = Arc::new(Settings {
            project_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        });
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let stage = ScanCode::new(scanner.clone());

        let mut ctx = ProcessingContext::for_event(&file, FileCategory::SourceCode, &settings);
        stage.apply(&mut ctx).await.unwrap();
        assert_eq!(ctx.scan_outcome, Some(ScanOutcome::Incremental));
        assert!(ctx.has_changes.is_true());

        // Removing a key escalates and triggers the full rescan
        tokio::fs::write(&file, "t('a');").await.unwrap();
        let mut ctx = ProcessingContext::for_event(&file, FileCategory::SourceCode, &settings);
        stage.apply(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.scan_outcome,
            Some(ScanOutcome::FullScan(FullScanReason::KeysRemoved))
        );
        assert_eq!(ctx.has_deletions, TriState::True);
        // The full scan replaced the store from disk
        assert_eq!(scanner.tracked_files(), 1);
        assert!(scanner.used_keys().contains("a"));
        assert!(!scanner.used_keys().contains("b"));
    }

    #[tokio::test]
    async fn test_missing_file_counts_as_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(Settings {
            project_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        });
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let stage = ScanCode::new(scanner);

        let ghost = dir.path().join("src/gone.ts");
        let mut ctx = ProcessingContext::for_event(&ghost, FileCategory::SourceCode, &settings);
        stage.apply(&mut ctx).await.unwrap();

        assert_eq!(
            ctx.scan_outcome,
            Some(ScanOutcome::FullScan(FullScanReason::FileDeleted))
        );
    }
}
