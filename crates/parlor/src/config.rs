//! Process configuration, read from the environment.

use std::path::PathBuf;

use crate::ParlorError;

/// Settings for the `parlor` binary.
///
/// | variable            | default   |
/// |---------------------|-----------|
/// | `PORT`              | `3000`    |
/// | `PARLOR_HOST`       | `0.0.0.0` |
/// | `PARLOR_DB_PATH`    | `chat.db` |
/// | `PARLOR_ADMIN_NAME` | `admin`   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Display name that grants admin rights (case-insensitive).
    pub admin_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            db_path: PathBuf::from("chat.db"),
            admin_name: "admin".to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ParlorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset or
    /// empty values fall back to the defaults.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ParlorError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ParlorError::Config(format!("PORT must be a port number, got {raw:?}"))
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: get("PARLOR_HOST").unwrap_or(defaults.host),
            port,
            db_path: get("PARLOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            admin_name: get("PARLOR_ADMIN_NAME").unwrap_or(defaults.admin_name),
        })
    }

    /// `host:port`, ready for [`ParlorServerBuilder::bind`](crate::ParlorServerBuilder::bind).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
