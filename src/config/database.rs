use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::config::helpers::{optional_env, parse_optional_env, required_env};
use crate::error::ConfigError;

/// PostgreSQL settings for the scalar (basic info) store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let url = required_env(
            "DATABASE_URL",
            "Set DATABASE_URL to a PostgreSQL connection string",
        )?;
        let pool_size = parse_optional_env("DATABASE_POOL_SIZE", 5)?;

        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_POOL_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            url: SecretString::from(url),
            pool_size,
        })
    }

    /// Get the database URL (exposes the secret).
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

/// libSQL settings for the profile document store.
#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub path: PathBuf,
}

impl DocumentStoreConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let path = optional_env("PROFILE_DOCUMENTS_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(default_documents_path);
        Ok(Self { path })
    }
}

/// Default document database file, relative to the working directory.
pub fn default_documents_path() -> PathBuf {
    PathBuf::from("profile_documents.db")
}
