//! Configuration Module
//!
//! Construction parameters for a cache, validated up front and optionally
//! loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default LRU capacity.
pub const DEFAULT_MAX_SIZE: usize = 128;

/// Cache construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Lifetime of admitted entries, None = never expires
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Creates a config with the given capacity and no expiry.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ttl: None,
        }
    }

    /// Sets the entry lifetime. A zero duration means entries never expire.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Sets the entry lifetime from fractional seconds.
    ///
    /// Negative, non-finite or out of range values are rejected.
    pub fn with_ttl_secs(self, secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "ttl must be a non-negative number of seconds, got {}",
                secs
            )));
        }
        let ttl = Duration::try_from_secs_f64(secs).map_err(|err| {
            CacheError::InvalidConfig(format!("ttl of {} seconds is out of range: {}", secs, err))
        })?;
        Ok(self.with_ttl(ttl))
    }

    /// Checks the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 128)
    /// - `CACHE_TTL_SECS` - Entry lifetime in seconds, 0 = forever (default: unset)
    ///
    /// Unlike missing variables, malformed ones are configuration errors.
    pub fn from_env() -> Result<Self> {
        let max_size = match env::var("CACHE_MAX_SIZE") {
            Ok(raw) => parse_max_size(&raw)?,
            Err(_) => DEFAULT_MAX_SIZE,
        };

        let config = Self::new(max_size);
        let config = match env::var("CACHE_TTL_SECS") {
            Ok(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| {
                    CacheError::InvalidConfig(format!("CACHE_TTL_SECS is not a number: {:?}", raw))
                })?;
                config.with_ttl_secs(secs)?
            }
            Err(_) => config,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_max_size(raw: &str) -> Result<usize> {
    // Parse signed so "-1" reports as out of range rather than unparsable.
    let value: i64 = raw.trim().parse().map_err(|_| {
        CacheError::InvalidConfig(format!("CACHE_MAX_SIZE is not an integer: {:?}", raw))
    })?;
    if value <= 0 {
        return Err(CacheError::InvalidConfig(format!(
            "max_size must be a positive integer, got {}",
            value
        )));
    }
    usize::try_from(value)
        .map_err(|_| CacheError::InvalidConfig(format!("max_size {} is too large", value)))
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
