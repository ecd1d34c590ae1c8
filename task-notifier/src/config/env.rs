//! Environment variable helpers.

use std::str::FromStr;
use std::sync::Once;

use crate::{Error, Result};

static DOTENV: Once = Once::new();

/// Load a `.env` file from the working directory, once per process.
///
/// A missing file is not an error.
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        dotenvy::dotenv().ok();
    });
}

/// Parse `key` from the environment, or return `default` when it is unset.
pub(super) fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

/// Parse `key` from the environment, `None` when it is unset or blank.
pub(super) fn parse_opt<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{} has an invalid value: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unset_key_uses_default() {
        let value: u64 = parse_or("TASK_NOTIFIER_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_opt_unset_is_none() {
        let value: Option<u32> = parse_opt("TASK_NOTIFIER_TEST_SURELY_UNSET_KEY").unwrap();
        assert!(value.is_none());
    }
}
