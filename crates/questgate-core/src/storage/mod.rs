mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, LoggingConfig, SettlementConfig, StorageConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `QUESTGATE_DATA_DIR` wins when set. Otherwise `~/.config/questgate`, or
/// `~/.config/questgate-dev` when `QUESTGATE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("QUESTGATE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("QUESTGATE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("questgate-dev")
            } else {
                base_dir.join("questgate")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
