use crate::error::ConfigError;

/// Read an env var, treating an empty value the same as an unset one.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn required_env(key: &str, hint: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: hint.to_string(),
    })
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global, so serialize tests that mutate them.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn optional_env_returns_none_for_missing_var() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::remove_var("_TEST_UP_MISSING_17") };
        assert!(optional_env("_TEST_UP_MISSING_17").unwrap().is_none());
    }

    #[test]
    fn optional_env_treats_blank_as_unset() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("_TEST_UP_BLANK_17", "   ") };
        assert!(optional_env("_TEST_UP_BLANK_17").unwrap().is_none());
        unsafe { std::env::remove_var("_TEST_UP_BLANK_17") };
    }

    #[test]
    fn required_env_reports_key_and_hint() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::remove_var("_TEST_UP_REQUIRED_17") };
        let err = required_env("_TEST_UP_REQUIRED_17", "set it").unwrap_err();
        match err {
            ConfigError::MissingRequired { key, hint } => {
                assert_eq!(key, "_TEST_UP_REQUIRED_17");
                assert_eq!(hint, "set it");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_optional_env_uses_default_then_value() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::remove_var("_TEST_UP_PARSE_17") };
        assert_eq!(parse_optional_env("_TEST_UP_PARSE_17", 5usize).unwrap(), 5);

        unsafe { std::env::set_var("_TEST_UP_PARSE_17", " 12 ") };
        assert_eq!(parse_optional_env("_TEST_UP_PARSE_17", 5usize).unwrap(), 12);
        unsafe { std::env::remove_var("_TEST_UP_PARSE_17") };
    }

    #[test]
    fn parse_optional_env_rejects_garbage() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("_TEST_UP_PARSE_BAD_17", "many") };
        let err = parse_optional_env("_TEST_UP_PARSE_BAD_17", 5usize).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "_TEST_UP_PARSE_BAD_17"));
        unsafe { std::env::remove_var("_TEST_UP_PARSE_BAD_17") };
    }
}
