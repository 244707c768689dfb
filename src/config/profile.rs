use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;
use crate::profile::evidence::DEFAULT_EVIDENCE_CAP;

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Maximum evidence entries kept per trait item.
    pub evidence_cap: usize,
    /// Evidence entries returned per item when a read does not ask for a limit.
    pub default_evidence_limit: i64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            default_evidence_limit: DEFAULT_EVIDENCE_CAP as i64,
        }
    }
}

impl ProfileConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let evidence_cap = parse_optional_env("PROFILE_EVIDENCE_CAP", defaults.evidence_cap)?;
        if evidence_cap == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PROFILE_EVIDENCE_CAP".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let default_evidence_limit = parse_optional_env(
            "PROFILE_DEFAULT_EVIDENCE_LIMIT",
            defaults.default_evidence_limit,
        )?;
        if default_evidence_limit < -1 {
            return Err(ConfigError::InvalidValue {
                key: "PROFILE_DEFAULT_EVIDENCE_LIMIT".to_string(),
                message: "must be -1, 0 or a positive count".to_string(),
            });
        }

        Ok(Self {
            evidence_cap,
            default_evidence_limit,
        })
    }
}

/// External summary source consulted when a profile is read before it exists.
#[derive(Debug, Clone)]
pub struct ColdStartConfig {
    pub base_url: String,
    /// Path segment naming the entity kind, as in `{base}/{entity}/{id}/summary`.
    pub entity: String,
    pub timeout: Duration,
}

impl ColdStartConfig {
    /// Returns `None` unless `COLD_START_BASE_URL` is set.
    pub(crate) fn resolve() -> Result<Option<Self>, ConfigError> {
        let Some(base_url) = optional_env("COLD_START_BASE_URL")? else {
            return Ok(None);
        };
        let entity = optional_env("COLD_START_ENTITY")?.unwrap_or_else(|| "child".to_string());
        let timeout_ms: u64 = parse_optional_env("COLD_START_TIMEOUT_MS", 1000)?;

        Ok(Some(Self {
            base_url,
            entity,
            timeout: Duration::from_millis(timeout_ms),
        }))
    }
}
