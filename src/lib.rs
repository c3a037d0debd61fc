//! Translation-asset synchronization core.
//!
//! Keeps three kinds of files mutually consistent inside a project:
//! JSON locale catalogs, gettext `.po` exports of those catalogs, and
//! source code containing translation-function calls. A filesystem
//! watcher feeds debounced change batches into one processing chain
//! per file category:
//!
//! ```text
//! locale-json: ReadSource → ExtractKeys → MachineTranslate → ExportPo
//! po:          ReadSource → ImportPo
//! source-code: ScanCode → UpdateCatalogs
//! ```
//!
//! Because the chains themselves write catalogs and exports, every
//! derived write is registered in a refcounted [`lock::LockTable`]
//! before it hits disk; when the watcher reports that write back as a
//! change event, the router consumes the lock instead of re-processing,
//! breaking the feedback loop.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod pipeline;
pub mod scanner;
pub mod types;
pub mod utils;
pub mod watcher;

pub use backend::{HttpBackend, NullBackend, TranslationBackend};
pub use config::Settings;
pub use error::{SyncError, SyncResult};
pub use lock::LockTable;
pub use pipeline::{ChainRegistry, ProcessingContext, Stage};
pub use scanner::{CodeScanner, FullScanReason, KeyUsage, ScanOutcome, ScanStats};
pub use types::{FileCategory, SourcePosition, TriState};
pub use watcher::{AssetWatcher, AssetWatcherBuilder, ChangeRouter, Debouncer};
