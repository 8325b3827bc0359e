//! Typed environment lookups shared by the pool and service config.
//!
//! A variable that is unset or empty counts as absent. A variable that is set
//! but does not parse is an error: a typo in `DB_MAX_CONNECTIONS` or
//! `LONG_POLL_TIMEOUT_MS` must stop startup instead of quietly running with
//! the default.

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key}={value:?} is not a valid {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// `Ok(None)` when `key` is unset or empty.
pub fn optional<T: FromStr>(key: &'static str) -> Result<Option<T>, EnvError> {
    let value = match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => return Ok(None),
    };
    value.parse().map(Some).map_err(|_| EnvError::Invalid {
        key,
        value,
        expected: std::any::type_name::<T>(),
    })
}

pub fn or_default<T: FromStr>(key: &'static str, default: T) -> Result<T, EnvError> {
    Ok(optional(key)?.unwrap_or(default))
}

pub fn required<T: FromStr>(key: &'static str) -> Result<T, EnvError> {
    optional(key)?.ok_or(EnvError::Missing(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    #[serial_test::serial]
    fn test_absent_and_empty_fall_back() {
        env::remove_var("DB_POOL_ENV_TEST");
        assert_eq!(or_default("DB_POOL_ENV_TEST", 7u32), Ok(7));

        env::set_var("DB_POOL_ENV_TEST", "");
        assert_eq!(optional::<u32>("DB_POOL_ENV_TEST"), Ok(None));
        env::remove_var("DB_POOL_ENV_TEST");
    }

    #[test]
    #[serial_test::serial]
    fn test_unparsable_value_is_an_error() {
        env::set_var("DB_POOL_ENV_TEST", "twenty");
        let err = or_default("DB_POOL_ENV_TEST", 20u32).unwrap_err();
        assert_eq!(
            err,
            EnvError::Invalid {
                key: "DB_POOL_ENV_TEST",
                value: "twenty".into(),
                expected: "u32",
            }
        );
        assert!(err.to_string().contains("DB_POOL_ENV_TEST=\"twenty\""));
        env::remove_var("DB_POOL_ENV_TEST");
    }

    #[test]
    #[serial_test::serial]
    fn test_required() {
        env::remove_var("DB_POOL_ENV_TEST");
        assert_eq!(
            required::<String>("DB_POOL_ENV_TEST"),
            Err(EnvError::Missing("DB_POOL_ENV_TEST"))
        );

        env::set_var("DB_POOL_ENV_TEST", "25000");
        assert_eq!(required::<u64>("DB_POOL_ENV_TEST"), Ok(25_000));
        env::remove_var("DB_POOL_ENV_TEST");
    }
}
