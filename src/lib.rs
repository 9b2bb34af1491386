//! ReportLens core: turns photographed medical documents into structured,
//! explained results and tracks indicators across reports.
//!
//! The core is headless. A frontend opens an [`AppCore`], submits page
//! images, and reads job records and trend series back; the actual vision
//! call goes through a relay so no credential lives on the device.

pub mod analysis;
pub mod config;
pub mod history;
pub mod jobs;
pub mod models;
pub mod profiles;
pub mod state;
pub mod storage;
pub mod trends;

pub use state::{AppCore, CoreError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. RUST_LOG overrides the default
/// crate-level filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .ok();
}
