//! Configuration for the synchronization core.
//!
//! Layered configuration:
//! - Default values
//! - `localesync.toml` configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LOCALESYNC_` and use
//! double underscores to separate nested levels:
//! - `LOCALESYNC_WATCH__DEBOUNCE_MS=150` sets `watch.debounce_ms`
//! - `LOCALESYNC_STAGES__MACHINE_TRANSLATE=false` sets `stages.machine_translate`
//! - `LOCALESYNC_BACKEND__ENDPOINT=...` sets `backend.endpoint`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "localesync.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Project root directory (where localesync.toml is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    /// Directory containing locale catalogs, relative to the project root
    #[serde(default = "default_locales_dir")]
    pub locales_dir: PathBuf,

    /// Locale that source texts are authored in
    #[serde(default = "default_source_locale")]
    pub source_locale: String,

    /// Locales derived from the source locale
    #[serde(default)]
    pub target_locales: Vec<String>,

    /// Code scanning configuration
    #[serde(default)]
    pub code: CodeScanConfig,

    /// Watcher configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Per-stage enable flags, checked at execution time
    #[serde(default)]
    pub stages: StageConfig,

    /// Machine translation backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CodeScanConfig {
    /// File extensions scanned for translation calls
    #[serde(default = "default_code_extensions")]
    pub extensions: Vec<String>,

    /// Function names recognized as translation calls
    #[serde(default = "default_translation_functions")]
    pub functions: Vec<String>,

    /// Directories to scan, relative to the project root
    #[serde(default = "default_code_paths")]
    pub paths: Vec<PathBuf>,

    /// Glob patterns excluded from scanning
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Quiet window before a burst of change events is flushed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How often the event loop polls for elapsed quiet windows
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Age after which a still-held write lock is reported as stale
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StageConfig {
    /// Extract key records from changed catalogs
    #[serde(default = "default_true")]
    pub extract_keys: bool,

    /// Fill missing target-locale values through the backend
    #[serde(default = "default_false")]
    pub machine_translate: bool,

    /// Write `.po` exports of changed catalogs
    #[serde(default = "default_true")]
    pub export_po: bool,

    /// Apply edited `.po` files back onto catalogs
    #[serde(default = "default_true")]
    pub import_po: bool,

    /// Add keys newly used in code to the source catalog
    #[serde(default = "default_true")]
    pub update_catalogs: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Translation endpoint (LibreTranslate-compatible)
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    /// Optional API key sent with each request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum texts per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_locales_dir() -> PathBuf {
    PathBuf::from("locales")
}
fn default_source_locale() -> String {
    "en".to_string()
}
fn default_code_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx"].map(String::from).to_vec()
}
fn default_translation_functions() -> Vec<String> {
    ["t", "$t", "i18n.t"].map(String::from).to_vec()
}
fn default_code_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}
fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules/**".to_string(),
        "dist/**".to_string(),
        "build/**".to_string(),
        "*.min.js".to_string(),
    ]
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_tick_ms() -> u64 {
    100
}
fn default_lock_stale_secs() -> u64 {
    60
}
fn default_batch_size() -> usize {
    50
}
fn default_backend_endpoint() -> String {
    "http://127.0.0.1:5000/translate".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            project_root: None,
            locales_dir: default_locales_dir(),
            source_locale: default_source_locale(),
            target_locales: Vec::new(),
            code: CodeScanConfig::default(),
            watch: WatchConfig::default(),
            stages: StageConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CodeScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_code_extensions(),
            functions: default_translation_functions(),
            paths: default_code_paths(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            tick_ms: default_tick_ms(),
            lock_stale_secs: default_lock_stale_secs(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            extract_keys: true,
            machine_translate: false,
            export_po: true,
            import_po: true,
            update_catalogs: true,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backend_endpoint(),
            api_key: None,
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path =
            Self::find_project_config().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscore
            // stays inside field names.
            .merge(Env::prefixed("LOCALESYNC_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.project_root.is_none() {
                    settings.project_root = Self::project_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LOCALESYNC_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the config file by walking up from the current directory.
    fn find_project_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let candidate = ancestor.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// Get the project root (the directory holding localesync.toml).
    pub fn project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            if ancestor.join(CONFIG_FILE).is_file() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Absolute locales directory.
    pub fn locales_root(&self) -> PathBuf {
        match &self.project_root {
            Some(root) => root.join(&self.locales_dir),
            None => self.locales_dir.clone(),
        }
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory.
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();
        if let Ok(current_dir) = std::env::current_dir() {
            settings.project_root = Some(current_dir);
        }

        settings.save(&config_path)?;

        Ok(config_path)
    }
}
