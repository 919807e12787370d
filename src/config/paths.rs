use std::path::Path;

use crate::constants::{APP_DIR_NAME, database::DATABASE_FILE_NAME};

/// Returns the platform-specific path for the config file.
///
/// # Notes
/// - Uses platform-specific config directory (e.g., ~/.config on Linux)
/// - Falls back to current directory if config directory is unavailable
pub fn get_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR_NAME)
        .join("config.toml")
        .to_string_lossy()
        .to_string()
}

/// Returns the platform-specific path for the log directory.
pub fn get_log_dir_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR_NAME)
        .join("logs")
        .to_string_lossy()
        .to_string()
}

/// Returns the default SQLite URL, rooted in the platform data directory.
///
/// `mode=rwc` lets SQLite create the file on first start.
pub fn get_default_database_url() -> String {
    let path = dirs::data_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR_NAME)
        .join(DATABASE_FILE_NAME);
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_app_dir() {
        assert!(get_config_path().contains(APP_DIR_NAME));
        assert!(get_config_path().ends_with("config.toml"));
        assert!(get_log_dir_path().ends_with("logs"));
    }

    #[test]
    fn test_default_database_url_is_sqlite() {
        let url = get_default_database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains(DATABASE_FILE_NAME));
        assert!(url.ends_with("?mode=rwc"));
    }
}
