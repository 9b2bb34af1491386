//! Application constants and filesystem locations.

use std::path::PathBuf;

pub const APP_NAME: &str = "ReportLens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data directory in the user's home, created on first open.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path to the SQLite database inside a data directory.
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("reportlens.db")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}
