//! Unified logging for the sync daemon.
//!
//! Compact timestamped logging with per-module level configuration.
//! Supports `RUST_LOG` environment variable for runtime overrides.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//!
//! [logging.modules]
//! watcher = "debug"  # enable watcher debug logs
//! ```
//!
//! Bare module keys name this crate's own modules; use a fully
//! qualified target (`notify`, `reqwest::connect`) for dependencies.
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug localesync watch
//! RUST_LOG=watcher=debug,pipeline=trace localesync watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only the first
/// call takes effect). `RUST_LOG` takes precedence over config settings.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let mut filter_str = config.default.clone();
            for (module, level) in &config.modules {
                filter_str.push_str(&format!(",{}={level}", target_directive(module)));
            }
            EnvFilter::new(&filter_str)
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging with default configuration (`warn`, quiet operation).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Map a `[logging.modules]` key to a tracing filter directive.
///
/// Bare names of this crate's modules gain the crate prefix so
/// `watcher = "debug"` matches `localesync::watcher::*` targets;
/// anything else (dependency crates, fully qualified paths) passes
/// through unchanged.
fn target_directive(module: &str) -> String {
    const OWN_MODULES: &[&str] = &[
        "backend", "catalog", "lock", "pipeline", "scanner", "watcher",
    ];

    if OWN_MODULES.contains(&module) {
        format!("{}::{module}", env!("CARGO_PKG_NAME"))
    } else {
        module.to_string()
    }
}


/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("router", "queued", "{}", path.display());
/// log_event!("pipeline", "chain complete");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("locks", "suppressed self-write", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
