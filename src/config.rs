//! Configuration for the profile service.
//!
//! Everything is read from environment variables; a `.env` file in the
//! working directory is loaded first when present.

mod database;
pub(crate) mod helpers;
mod llm;
mod profile;

pub use self::database::{DatabaseConfig, DocumentStoreConfig};
pub use self::llm::LlmConfig;
pub use self::profile::{ColdStartConfig, ProfileConfig};

use crate::error::ConfigError;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub documents: DocumentStoreConfig,
    pub llm: LlmConfig,
    pub profile: ProfileConfig,
    /// `None` when no summary source is configured.
    pub cold_start: Option<ColdStartConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database: DatabaseConfig::resolve()?,
            documents: DocumentStoreConfig::resolve()?,
            llm: LlmConfig::resolve()?,
            profile: ProfileConfig::resolve()?,
            cold_start: ColdStartConfig::resolve()?,
        })
    }
}
