//! File watching for automatic re-synchronization.
//!
//! A single notify watcher feeds the change router, which classifies
//! events, suppresses self-inflicted writes through the lock table, and
//! coalesces the rest through the debouncer before chains run.
//!
//! ```text
//! AssetWatcher
//!   - Single notify::RecommendedWatcher
//!   - tokio::select! over events + debounce tick
//!         |
//!    ChangeRouter
//!      - classify (locale-json / po / source-code)
//!      - LockTable check: consume self-writes
//!      - Debouncer: coalesce per scope
//!      - flush -> ChainRegistry::run
//! ```

mod debouncer;
mod error;
mod router;
mod unified;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use router::ChangeRouter;
pub use unified::{AssetWatcher, AssetWatcherBuilder};
