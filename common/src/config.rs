use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const POLL_INTERVAL_DEFAULT_MS: u32 = 500;
/// Beyond this the unit reconnects but stops answering status requests.
pub const POLL_INTERVAL_MAX_MS: u32 = 9_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdapterConfig {
    pub baud_rate: u32,
    pub poll_interval_ms: u32,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub temperature_step: f32,
    pub remote_temperature_resend_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            baud_rate: 2_400,
            poll_interval_ms: POLL_INTERVAL_DEFAULT_MS,
            min_temperature: 16.0,
            max_temperature: 31.0,
            temperature_step: 0.5,
            remote_temperature_resend_ms: 30_000,
        }
    }
}

impl AdapterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=POLL_INTERVAL_MAX_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::PollInterval(self.poll_interval_ms));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::BaudRate);
        }
        if !self.min_temperature.is_finite()
            || !self.max_temperature.is_finite()
            || self.min_temperature >= self.max_temperature
        {
            return Err(ConfigError::TemperatureBounds);
        }
        if !(self.temperature_step.is_finite() && self.temperature_step > 0.0) {
            return Err(ConfigError::TemperatureStep);
        }
        Ok(())
    }

    pub fn bounds(&self) -> TemperatureBounds {
        TemperatureBounds {
            min: self.min_temperature,
            max: self.max_temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBounds {
    pub min: f32,
    pub max: f32,
}

impl TemperatureBounds {
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}
