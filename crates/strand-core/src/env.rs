//! Environment variable utilities
//!
//! Runtime overrides for configuration use the `STRAND_` prefix.
//!
//! ```ignore
//! use strand_core::env::{env_get, env_get_bool, env_get_size};
//!
//! let carriers: usize = env_get("STRAND_NUM_CARRIERS", 4);
//! let preserve: bool = env_get_bool("STRAND_PRESERVE_FPU", true);
//! let stack: usize = env_get_size("STRAND_STACK_SIZE", 64 * 1024); // accepts "256k", "8m"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" are true and "0", "false", "no", "off" are false
/// (case-insensitive). Anything else, including unset, returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get a byte size, accepting an optional `k`, `m` or `g` suffix (binary units)
pub fn env_get_size(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim().to_lowercase();
    let (digits, shift) = match raw.as_bytes().last()? {
        b'k' => (&raw[..raw.len() - 1], 10),
        b'm' => (&raw[..raw.len() - 1], 20),
        b'g' => (&raw[..raw.len() - 1], 30),
        _ => (raw.as_str(), 0),
    };
    let value: usize = digits.trim().replace('_', "").parse().ok()?;
    value.checked_mul(1usize.checked_shl(shift)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "__STRAND_TEST_UNSET_VAR__";

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(env_get::<usize>(UNSET, 42), 42);
        assert!(env_get_bool(UNSET, true));
        assert!(!env_get_bool(UNSET, false));
        assert!(env_get_opt::<usize>(UNSET).is_none());
        assert_eq!(env_get_str(UNSET, "hello"), "hello");
        assert_eq!(env_get_size(UNSET, 4096), 4096);
        assert!(!env_is_set(UNSET));
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__STRAND_TEST_COUNT__", " 17 ");
        assert_eq!(env_get::<usize>("__STRAND_TEST_COUNT__", 0), 17);
        std::env::remove_var("__STRAND_TEST_COUNT__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        let key = "__STRAND_TEST_BOOL__";
        for (val, expected) in [("1", true), ("YES", true), ("on", true), ("0", false), ("Off", false)] {
            std::env::set_var(key, val);
            assert_eq!(env_get_bool(key, !expected), expected, "value {:?}", val);
        }
        std::env::set_var(key, "maybe");
        assert!(env_get_bool(key, true));
        std::env::remove_var(key);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("64k"), Some(64 * 1024));
        assert_eq!(parse_size("8M"), Some(8 * 1024 * 1024));
        assert_eq!(parse_size("1_024"), Some(1024));
        assert_eq!(parse_size("k"), None);
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__STRAND_TEST_BAD__", "not_a_number");
        assert_eq!(env_get::<usize>("__STRAND_TEST_BAD__", 9), 9);
        std::env::remove_var("__STRAND_TEST_BAD__");
    }
}
