// Crate root library declaration and module exports.
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod notifier;
pub mod picker;
pub mod reconcile;
pub mod storage;
pub mod sync;
pub mod vault;

pub use error::{ConfigError, ServiceError, SyncError};
pub use sync::{Outcome, SkipReason, SyncReport, SyncSettings, run_sync, sync};
