//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Per-asset generator configuration and validation."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;

use crate::asset::{AssetType, EnergyType};

/// Measurement intervals must be strictly longer than this.
pub const MIN_MEASUREMENT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("asset id is required")]
    EmptyAssetId,
    #[error("invalid asset type: {0}")]
    InvalidAssetType(String),
    #[error("measurement interval {interval:?} must be greater than {minimum:?}")]
    IntervalTooShort {
        interval: Duration,
        minimum: Duration,
    },
    #[error("minPower {min_power} is greater than maxPower {max_power}")]
    MinPowerExceedsMaxPower { min_power: f64, max_power: f64 },
    #[error("minPower and maxPower must be {expected} for {energy_type} assets")]
    SignConvention {
        energy_type: EnergyType,
        expected: &'static str,
    },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

/// Fully resolved input of a measurement generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfiguration {
    pub asset_id: String,
    pub energy_type: EnergyType,
    pub min_power: f64,
    pub max_power: f64,
    pub max_power_step: f64,
    pub measurement_interval: Duration,
}

impl GeneratorConfiguration {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.asset_id.trim().is_empty() {
            return Err(ConfigurationError::EmptyAssetId);
        }
        for (field, value) in [
            ("minPower", self.min_power),
            ("maxPower", self.max_power),
            ("maxPowerStep", self.max_power_step),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::NotFinite { field });
            }
        }
        if self.measurement_interval <= MIN_MEASUREMENT_INTERVAL {
            return Err(ConfigurationError::IntervalTooShort {
                interval: self.measurement_interval,
                minimum: MIN_MEASUREMENT_INTERVAL,
            });
        }
        self.energy_type
            .validate_bounds(self.min_power, self.max_power)
    }

    /// Power used to normalise integrated energy into a percentage.
    ///
    /// Producers use the magnitude so that the percentage keeps its sign.
    pub fn reference_power(&self) -> f64 {
        match self.energy_type {
            EnergyType::Producer => self.max_power.abs(),
            EnergyType::Consumer | EnergyType::Combined => self.max_power,
        }
    }
}

/// Asset configuration as supplied by operators or the configuration store.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfiguration {
    pub asset_id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(rename = "measurement_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub measurement_interval: Duration,
    pub min_power: f64,
    pub max_power: f64,
    #[serde(default)]
    pub max_power_step: f64,
}

impl AssetConfiguration {
    pub fn energy_type(&self) -> EnergyType {
        self.asset_type.energy_type()
    }

    /// Resolve the energy type and validate the result.
    pub fn to_generator_configuration(&self) -> Result<GeneratorConfiguration, ConfigurationError> {
        let config = GeneratorConfiguration {
            asset_id: self.asset_id.clone(),
            energy_type: self.energy_type(),
            min_power: self.min_power,
            max_power: self.max_power,
            max_power_step: self.max_power_step,
            measurement_interval: self.measurement_interval,
        };
        config.validate()?;
        Ok(config)
    }
}
