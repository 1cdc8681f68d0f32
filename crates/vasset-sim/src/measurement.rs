//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Telemetry sample produced by asset generators."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of the state of energy, in percent.
pub const SOE_EMPTY: f64 = 0.0;
/// Upper bound of the state of energy, in percent.
pub const SOE_FULL: f64 = 100.0;

/// Unit attached to a power reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerUnit {
    #[default]
    #[serde(rename = "W")]
    Watt,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Power {
    pub value: f64,
    pub unit: PowerUnit,
}

impl Power {
    pub fn watts(value: f64) -> Self {
        Self {
            value,
            unit: PowerUnit::Watt,
        }
    }
}

/// One telemetry sample for an asset.
///
/// `state_of_energy` is a percentage and always lies in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub power: Power,
    pub state_of_energy: f64,
    pub time: DateTime<Utc>,
}

impl Measurement {
    /// Zero-power sample used to seed the energy integral.
    pub fn zero(state_of_energy: f64, time: DateTime<Utc>) -> Self {
        Self {
            power: Power::watts(0.0),
            state_of_energy: clamp_soe(state_of_energy),
            time,
        }
    }
}

pub(crate) fn clamp_soe(value: f64) -> f64 {
    value.clamp(SOE_EMPTY, SOE_FULL)
}
