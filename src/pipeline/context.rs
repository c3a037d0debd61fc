//! Per-run state threaded through a processing chain.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::catalog::TranslationKeyRecord;
use crate::config::Settings;
use crate::scanner::ScanOutcome;
use crate::types::{FileCategory, TriState};

/// The unit of state one chain execution mutates.
///
/// Created fresh per triggering event (or per full scan), passed by
/// mutable reference through the chain, discarded afterwards. A stage
/// only reads fields populated by earlier stages in its chain.
#[derive(Debug, Default)]
pub struct ProcessingContext {
    /// Source artifact that triggered this run.
    pub input_path: PathBuf,
    /// Derived artifact this run is expected to write, when known.
    pub output_path: Option<PathBuf>,
    /// Locale of the input artifact, when derivable from its name.
    pub locale: Option<String>,

    pub has_changes: TriState,
    pub has_deletions: TriState,
    pub has_renames: TriState,

    /// Raw text of the input, populated by the read stage.
    pub content: Option<String>,
    /// Parsed JSON document, populated by the extract stage.
    pub document: Option<Value>,
    /// Leaf records of `document`, populated by the extract stage.
    pub keys: Option<Vec<TranslationKeyRecord>>,
    /// Scan classification, populated by the scan stage.
    pub scan_outcome: Option<ScanOutcome>,
}

impl ProcessingContext {
    /// Build a context for a triggering event, deriving locale and
    /// expected output path from the input's category.
    ///
    /// - `locales/de.json` → output `locales/de.po`, locale `de`
    /// - `locales/de.po` → output `locales/de.json`, locale `de`
    /// - source files → output is the source-locale catalog
    pub fn for_event(path: &Path, category: FileCategory, settings: &Settings) -> Self {
        let mut ctx = Self {
            input_path: path.to_path_buf(),
            ..Self::default()
        };

        match category {
            FileCategory::LocaleJson => {
                ctx.locale = file_stem(path);
                ctx.output_path = Some(path.with_extension("po"));
            }
            FileCategory::Po => {
                ctx.locale = file_stem(path);
                ctx.output_path = Some(path.with_extension("json"));
            }
            FileCategory::SourceCode => {
                ctx.locale = Some(settings.source_locale.clone());
                ctx.output_path = Some(
                    settings
                        .locales_root()
                        .join(format!("{}.json", settings.source_locale)),
                );
            }
        }

        ctx
    }

    /// True when the input is the source-locale catalog (or the run was
    /// triggered by code, which always targets the source locale).
    pub fn is_source_locale(&self, settings: &Settings) -> bool {
        self.locale.as_deref() == Some(settings.source_locale.as_str())
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_event_locale_json() {
        let settings = Settings::default();
        let ctx = ProcessingContext::for_event(
            Path::new("/proj/locales/de.json"),
            FileCategory::LocaleJson,
            &settings,
        );

        assert_eq!(ctx.locale.as_deref(), Some("de"));
        assert_eq!(
            ctx.output_path.as_deref(),
            Some(Path::new("/proj/locales/de.po"))
        );
        assert!(!ctx.has_changes.is_known());
    }

    #[test]
    fn test_for_event_po_derives_json_output() {
        let settings = Settings::default();
        let ctx = ProcessingContext::for_event(
            Path::new("/proj/locales/fr.po"),
            FileCategory::Po,
            &settings,
        );

        assert_eq!(ctx.locale.as_deref(), Some("fr"));
        assert_eq!(
            ctx.output_path.as_deref(),
            Some(Path::new("/proj/locales/fr.json"))
        );
    }

    #[test]
    fn test_for_event_source_targets_source_catalog() {
        let settings = Settings {
            project_root: Some(PathBuf::from("/proj")),
            ..Settings::default()
        };
        let ctx = ProcessingContext::for_event(
            Path::new("/proj/src/App.tsx"),
            FileCategory::SourceCode,
            &settings,
        );

        assert_eq!(ctx.locale.as_deref(), Some("en"));
        assert_eq!(
            ctx.output_path.as_deref(),
            Some(Path::new("/proj/locales/en.json"))
        );
        assert!(ctx.is_source_locale(&settings));
    }
}
