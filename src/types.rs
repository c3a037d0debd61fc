//! Core value types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::Settings;

/// Category of a watched translation asset, used to select the
/// processing chain for a file-system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// JSON locale catalog under the locales directory.
    LocaleJson,
    /// gettext `.po` export.
    Po,
    /// Source code containing translation-function calls.
    SourceCode,
}

impl FileCategory {
    /// Classify a path by extension and location.
    ///
    /// JSON and PO files count as assets only inside the locales
    /// directory; a `.json` or `.po` elsewhere is nobody's business.
    /// Source files must carry one of the configured code extensions.
    pub fn classify(path: &Path, settings: &Settings) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();

        match ext.as_str() {
            "json" => path
                .starts_with(settings.locales_root())
                .then_some(Self::LocaleJson),
            "po" | "pot" => path
                .starts_with(settings.locales_root())
                .then_some(Self::Po),
            _ => settings
                .code
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&ext))
                .then_some(Self::SourceCode),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocaleJson => "locale-json",
            Self::Po => "po",
            Self::SourceCode => "source-code",
        }
    }
}

/// Three-valued change flag carried on a processing context.
///
/// `Unknown` means no stage has determined the answer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    True,
    False,
    #[default]
    Unknown,
}

impl TriState {
    pub fn is_true(self) -> bool {
        self == TriState::True
    }

    pub fn is_known(self) -> bool {
        self != TriState::Unknown
    }
}

impl From<bool> for TriState {
    fn from(v: bool) -> Self {
        if v { TriState::True } else { TriState::False }
    }
}

/// Position of an extracted key in its source document, 1-based line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}
