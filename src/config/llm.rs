use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env, required_env};
use crate::error::ConfigError;

/// Settings for the OpenAI-compatible endpoint used as the profile oracle.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Sampling temperature sent with every oracle call.
    pub temperature: f32,
    pub timeout: Duration,
    /// Send `response_format: json_object`. Off by default; not every
    /// compatible server accepts it.
    pub json_mode: bool,
}

impl LlmConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let base_url = required_env(
            "LLM_BASE_URL",
            "Set LLM_BASE_URL to an OpenAI-compatible endpoint, e.g. http://localhost:11434/v1",
        )?;
        let model = required_env("LLM_MODEL", "Set LLM_MODEL to the model used for extraction")?;
        let api_key = optional_env("LLM_API_KEY")?.map(SecretString::from);
        let temperature: f32 = parse_optional_env("LLM_TEMPERATURE", 0.0)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }
        let timeout_secs: u64 = parse_optional_env("LLM_TIMEOUT_SECS", 120)?;
        let json_mode = parse_optional_env("LLM_JSON_MODE", false)?;

        Ok(Self {
            base_url,
            api_key,
            model,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
            json_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::tests::ENV_LOCK;

    fn clear() {
        unsafe {
            for key in [
                "LLM_BASE_URL",
                "LLM_MODEL",
                "LLM_API_KEY",
                "LLM_TEMPERATURE",
                "LLM_TIMEOUT_SECS",
                "LLM_JSON_MODE",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn resolves_with_defaults() {
        let _lock = ENV_LOCK.lock();
        clear();
        unsafe {
            std::env::set_var("LLM_BASE_URL", "http://localhost:8000");
            std::env::set_var("LLM_MODEL", "qwen2.5");
        }
        let cfg = LlmConfig::resolve().unwrap();
        assert_eq!(cfg.model, "qwen2.5");
        assert!(cfg.api_key.is_none());
        assert_eq!(cfg.temperature, 0.0);
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        assert!(!cfg.json_mode);
        clear();
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let _lock = ENV_LOCK.lock();
        clear();
        unsafe {
            std::env::set_var("LLM_BASE_URL", "http://localhost:8000");
            std::env::set_var("LLM_MODEL", "qwen2.5");
            std::env::set_var("LLM_TEMPERATURE", "3.5");
        }
        assert!(matches!(
            LlmConfig::resolve(),
            Err(ConfigError::InvalidValue { .. })
        ));
        clear();
    }
}
