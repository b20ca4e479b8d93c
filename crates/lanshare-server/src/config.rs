//! Directory service configuration loaded from environment variables.
//!
//! Every setting has a default, so the service starts with zero
//! configuration on a development machine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use lanshare_shared::constants::{DEFAULT_DIRECTORY_PORT, MAX_FILE_SIZE};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `LANSHARE_HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `LANSHARE_DB_PATH`
    /// Default: `./lanshare.db`
    pub db_path: PathBuf,

    /// Largest declared size accepted by file registration.
    /// Env: `LANSHARE_MAX_FILE_SIZE`
    /// Default: 1 GiB
    pub max_file_size: u64,

    /// Request body limit for the JSON API.
    /// Env: `LANSHARE_MAX_BODY_BYTES`
    /// Default: 64 KiB
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_DIRECTORY_PORT).into(),
            db_path: PathBuf::from("./lanshare.db"),
            max_file_size: MAX_FILE_SIZE,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = parsed_var("LANSHARE_HTTP_ADDR") {
            config.http_addr = addr;
        }

        if let Ok(path) = std::env::var("LANSHARE_DB_PATH") {
            if !path.is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }

        if let Some(max) = parsed_var("LANSHARE_MAX_FILE_SIZE") {
            config.max_file_size = max;
        }

        if let Some(max) = parsed_var("LANSHARE_MAX_BODY_BYTES") {
            config.max_body_bytes = max;
        }

        config
    }
}

/// Read and parse one variable. Unparseable values are logged and ignored.
fn parsed_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.max_file_size, 1 << 30);
        assert_eq!(config.max_body_bytes, 65_536);
    }

    #[test]
    fn test_parsed_var_ignores_garbage() {
        std::env::set_var("LANSHARE_TEST_PARSED_VAR", "not-a-number");
        assert_eq!(parsed_var::<u64>("LANSHARE_TEST_PARSED_VAR"), None);
        std::env::set_var("LANSHARE_TEST_PARSED_VAR", "42");
        assert_eq!(parsed_var::<u64>("LANSHARE_TEST_PARSED_VAR"), Some(42));
        std::env::remove_var("LANSHARE_TEST_PARSED_VAR");
    }
}
