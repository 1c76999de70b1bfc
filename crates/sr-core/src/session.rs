//! Compute session settings.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Settings of the compute session passed to model construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fraction of device memory the session may claim, in (0, 1]
    pub gpu_memory_fraction: f32,
    /// Index of the accelerator to run on
    pub device_index: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gpu_memory_fraction: 0.8,
            device_index: 0,
        }
    }
}

impl SessionConfig {
    pub fn new(gpu_memory_fraction: f32) -> Self {
        Self {
            gpu_memory_fraction,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.gpu_memory_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::Config(format!(
                "gpu_memory_fraction must be in (0, 1], got {fraction}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_fraction_bounds() {
        assert!(SessionConfig::default().validate().is_ok());
        assert!(SessionConfig::new(1.0).validate().is_ok());
        assert!(SessionConfig::new(0.0).validate().is_err());
        assert!(SessionConfig::new(1.2).validate().is_err());
        assert!(SessionConfig::new(f32::NAN).validate().is_err());
    }
}
