//! Read stage: load the input artifact's text into the context.

use async_trait::async_trait;

use crate::debug_event;
use crate::error::{SyncError, SyncResult};
use crate::pipeline::{ProcessingContext, Stage};

/// Loads `ctx.input_path` into `ctx.content`.
///
/// A file that vanished between the flush decision and this read is not
/// an error: the deletion event is on its way and will escalate the
/// next batch. Later stages see an absent `content` and no-op.
pub struct ReadSource;

#[async_trait]
impl Stage for ReadSource {
    fn name(&self) -> &'static str {
        "read-source"
    }

    async fn apply(&self, ctx: &mut ProcessingContext) -> SyncResult<()> {
        match tokio::fs::read_to_string(&ctx.input_path).await {
            Ok(content) => {
                ctx.content = Some(content);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug_event!(self.name(), "input vanished", "{}", ctx.input_path.display());
                Ok(())
            }
            Err(e) => Err(SyncError::from_io(&ctx.input_path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_populates_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en.json");
        tokio::fs::write(&path, r#"{"a":"b"}"#).await.unwrap();

        let mut ctx = ProcessingContext {
            input_path: path,
            ..Default::default()
        };
        ReadSource.apply(&mut ctx).await.unwrap();
        assert_eq!(ctx.content.as_deref(), Some(r#"{"a":"b"}"#));
    }

    #[tokio::test]
    async fn test_missing_input_is_clean_noop() {
        let mut ctx = ProcessingContext {
            input_path: "/no/such/file.json".into(),
            ..Default::default()
        };
        ReadSource.apply(&mut ctx).await.unwrap();
        assert!(ctx.content.is_none());
    }
}
