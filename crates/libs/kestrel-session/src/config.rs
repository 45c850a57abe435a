use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a session's wait queue.
///
/// `max_age` is how long an unclaimed message may stay pending before the
/// housekeeper evicts it; `sweep_interval` is how often the housekeeper
/// runs. Keeping `sweep_interval` at or below `max_age` keeps eviction
/// timely.
#[derive(Clone, Debug)]
pub struct WaitQueueConfig {
    pub name: String,
    pub max_age: Duration,
    pub sweep_interval: Duration,
    pub default_timeout: Duration,
}

impl WaitQueueConfig {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn set_max_age_millis(&mut self, millis: u64) {
        self.max_age = Duration::from_millis(millis);
    }

    pub fn set_sweep_interval_millis(&mut self, millis: u64) {
        self.sweep_interval = Duration::from_millis(millis);
    }

    pub fn set_default_timeout_millis(&mut self, millis: u64) {
        self.default_timeout = Duration::from_millis(millis);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_age.is_zero() {
            return Err(ConfigError::NotPositive { field: "max_age" });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::NotPositive { field: "sweep_interval" });
        }
        if self.default_timeout.is_zero() {
            return Err(ConfigError::NotPositive { field: "default_timeout" });
        }
        Ok(())
    }
}

impl Default for WaitQueueConfig {
    fn default() -> Self {
        Self {
            name: "mwq".into(),
            max_age: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            default_timeout: Duration::from_secs(30),
        }
    }
}
