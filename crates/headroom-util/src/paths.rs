//! Default paths for headroomd components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/headroomd/config.toml` or `~/.config/headroomd/config.toml`
//! - Socket: `$XDG_RUNTIME_DIR/headroomd/headroomd.sock` or `/tmp/headroomd-$USER/headroomd.sock`
//! - Data: `$XDG_DATA_HOME/headroomd` or `~/.local/share/headroomd`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const HEADROOM_SOCKET_ENV: &str = "HEADROOM_SOCKET";

/// Environment variable for overriding the data directory
pub const HEADROOM_DATA_DIR_ENV: &str = "HEADROOM_DATA_DIR";

const SOCKET_FILENAME: &str = "headroomd.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "headroomd";

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    match home_dir() {
        Some(home) => home.join(".config").join(APP_DIR).join(CONFIG_FILENAME),
        None => PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME),
    }
}

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$HEADROOM_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/headroomd/headroomd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/headroomd-$USER/headroomd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(HEADROOM_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the HEADROOM_SOCKET env var.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$HEADROOM_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/headroomd` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/headroomd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(HEADROOM_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the HEADROOM_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    match home_dir() {
        Some(home) => home.join(".local").join("share").join(APP_DIR),
        None => PathBuf::from("/tmp").join(APP_DIR).join("data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_app_dir() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("headroomd"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn data_dir_contains_app_dir() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("headroomd"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.ends_with("headroomd/config.toml"));
    }
}
