//! Service configuration from environment variables

use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read once at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Upper bound for a single conversion or check
    pub convert_timeout: Duration,
    /// Largest accepted upload or fetched image
    pub max_image_bytes: usize,
    pub cache_ttl: Duration,
    /// Maximum number of cached conversions
    pub cache_capacity: usize,
    /// Let `/convert/url` reach loopback and private networks
    pub allow_private_fetch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            convert_timeout: Duration::from_secs(30),
            max_image_bytes: 8 * 1024 * 1024,
            cache_ttl: Duration::from_secs(60 * 60),
            cache_capacity: 256,
            allow_private_fetch: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            convert_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CONVERT_TIMEOUT_SECS",
                defaults.convert_timeout.as_secs(),
            )),
            max_image_bytes: parse_or(&lookup, "MAX_IMAGE_BYTES", defaults.max_image_bytes),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            cache_capacity: parse_or(&lookup, "CACHE_CAPACITY", defaults.cache_capacity),
            allow_private_fetch: parse_or(
                &lookup,
                "ALLOW_PRIVATE_FETCH",
                defaults.allow_private_fetch,
            ),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}
