//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Asset categories and their energy flow conventions."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::configuration::ConfigurationError;

/// Direction of energy flow for an asset.
///
/// Producers report non-positive power, consumers non-negative power, and
/// combined assets (storage) may report either sign.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyType {
    Producer,
    Consumer,
    Combined,
}

impl EnergyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyType::Producer => "producer",
            EnergyType::Consumer => "consumer",
            EnergyType::Combined => "combined",
        }
    }

    /// Check that a power band follows the sign convention of this energy type.
    pub fn validate_bounds(&self, min_power: f64, max_power: f64) -> Result<(), ConfigurationError> {
        match self {
            EnergyType::Producer if min_power > 0.0 || max_power > 0.0 => {
                return Err(ConfigurationError::SignConvention {
                    energy_type: *self,
                    expected: "non-positive",
                });
            }
            EnergyType::Consumer if min_power < 0.0 || max_power < 0.0 => {
                return Err(ConfigurationError::SignConvention {
                    energy_type: *self,
                    expected: "non-negative",
                });
            }
            _ => {}
        }
        if min_power.abs() > max_power.abs() {
            return Err(ConfigurationError::MinPowerExceedsMaxPower {
                min_power,
                max_power,
            });
        }
        Ok(())
    }
}

impl fmt::Display for EnergyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a simulated device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AssetType {
    Battery,
    Motor,
    Heater,
    Solar,
    Wind,
    HeatTurbine,
    HydroTurbine,
}

impl AssetType {
    pub const ALL: [AssetType; 7] = [
        AssetType::Battery,
        AssetType::Motor,
        AssetType::Heater,
        AssetType::Solar,
        AssetType::Wind,
        AssetType::HeatTurbine,
        AssetType::HydroTurbine,
    ];

    pub fn energy_type(&self) -> EnergyType {
        match self {
            AssetType::Battery => EnergyType::Combined,
            AssetType::Motor | AssetType::Heater => EnergyType::Consumer,
            AssetType::Solar | AssetType::Wind | AssetType::HeatTurbine | AssetType::HydroTurbine => {
                EnergyType::Producer
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Battery => "battery",
            AssetType::Motor => "motor",
            AssetType::Heater => "heater",
            AssetType::Solar => "solar",
            AssetType::Wind => "wind",
            AssetType::HeatTurbine => "heat_turbine",
            AssetType::HydroTurbine => "hydro_turbine",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AssetType::ALL
            .into_iter()
            .find(|asset| asset.as_str() == normalized)
            .ok_or_else(|| ConfigurationError::InvalidAssetType(s.to_owned()))
    }
}

impl TryFrom<String> for AssetType {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_types_map_to_energy_types() {
        assert_eq!(AssetType::Battery.energy_type(), EnergyType::Combined);
        assert_eq!(AssetType::Motor.energy_type(), EnergyType::Consumer);
        assert_eq!(AssetType::Heater.energy_type(), EnergyType::Consumer);
        for producer in [
            AssetType::Solar,
            AssetType::Wind,
            AssetType::HeatTurbine,
            AssetType::HydroTurbine,
        ] {
            assert_eq!(producer.energy_type(), EnergyType::Producer);
        }
    }

    #[test]
    fn parses_known_asset_types() {
        assert_eq!("wind".parse::<AssetType>().unwrap(), AssetType::Wind);
        assert_eq!(
            " Hydro_Turbine ".parse::<AssetType>().unwrap(),
            AssetType::HydroTurbine
        );
    }

    #[test]
    fn rejects_unknown_asset_type() {
        let err = "nuclear".parse::<AssetType>().unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidAssetType(ref t) if t == "nuclear"));
        assert!(err.to_string().contains("invalid asset type"));
    }

    #[test]
    fn producer_bounds_must_be_non_positive() {
        assert!(EnergyType::Producer.validate_bounds(-300.0, -1000.0).is_ok());
        assert!(EnergyType::Producer.validate_bounds(10.0, -1000.0).is_err());
    }

    #[test]
    fn consumer_bounds_must_be_non_negative() {
        assert!(EnergyType::Consumer.validate_bounds(0.0, 2000.0).is_ok());
        assert!(EnergyType::Consumer.validate_bounds(-1.0, 2000.0).is_err());
    }

    #[test]
    fn min_magnitude_cannot_exceed_max_magnitude() {
        let err = EnergyType::Combined
            .validate_bounds(-5000.0, 1000.0)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MinPowerExceedsMaxPower { .. }
        ));
        assert!(EnergyType::Combined.validate_bounds(-1000.0, 1000.0).is_ok());
    }
}
