mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, LoggingConfig, MealSlot, RemindersConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns the fitplan data directory, creating it if needed.
///
/// Resolution order:
/// - `FITPLAN_DATA_DIR`, used verbatim when set
/// - `~/.config/fitplan-dev/` when `FITPLAN_ENV=dev`
/// - `~/.config/fitplan/`
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("FITPLAN_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FITPLAN_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("fitplan-dev")
            } else {
                base_dir.join("fitplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
