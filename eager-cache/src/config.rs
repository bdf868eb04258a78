//! Cache and registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use eager_core::constants::{
    DEFAULT_INITIAL_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, ENV_SWEEP_MS, ENV_TTL_MS,
};
use eager_core::error::{EagerError, Result};

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name used in logs and stats
    pub name: String,
    /// Entry time-to-live, `ttl_ms` in JSON
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
    /// Capacity reserved for the entry map up front
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cache".into(),
            ttl: DEFAULT_TTL,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(ttl) = env_millis(ENV_TTL_MS)? {
            config.ttl = ttl;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the initial capacity.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Time-to-live as a `Duration`.
    pub fn ttl_duration(&self) -> Duration {
        self.ttl
    }

    /// Rejects a zero TTL.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(EagerError::ConfigError("ttl must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Registry configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Time between sweep passes, `sweep_interval_ms` in JSON
    #[serde(rename = "sweep_interval_ms", with = "duration_ms")]
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RegistryConfig {
    /// Reads overrides from the environment on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(interval) = env_millis(ENV_SWEEP_MS)? {
            config.sweep_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sweep interval as a `Duration`.
    pub fn sweep_interval_duration(&self) -> Duration {
        self.sweep_interval
    }

    /// Rejects a zero interval.
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.sweep_interval_duration())
    }
}

pub(crate) fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(EagerError::ConfigError(
            "sweep interval must be greater than zero".into(),
        ));
    }
    Ok(())
}

fn env_millis(var: &str) -> Result<Option<Duration>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| EagerError::ConfigError(format!("{var}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Serializes a `Duration` as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    // Rounds up so a non-zero duration never serializes as zero
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = duration.as_nanos().div_ceil(1_000_000);
        serializer.serialize_u64(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
