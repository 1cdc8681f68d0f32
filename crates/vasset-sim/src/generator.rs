//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Stateful per-asset measurement generators."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use rand::prelude::*;
use thiserror::Error;

use crate::asset::EnergyType;
use crate::clock::{Clock, SystemClock};
use crate::configuration::GeneratorConfiguration;
use crate::measurement::{clamp_soe, Measurement, Power, SOE_EMPTY, SOE_FULL};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("measurement generation failed for asset {asset_id}: {reason}")]
    Failed { asset_id: String, reason: String },
}

/// Produces the next telemetry sample of one asset.
///
/// Implementations keep the previous measurement and are stepped once per
/// runner tick; the first call always yields a zero-power, zero-energy baseline.
pub trait MeasurementGenerator: Send {
    fn generate_measurement(&mut self) -> Result<Measurement, GenerationError>;

    fn energy_type(&self) -> EnergyType;
}

/// Closed power interval a generator is allowed to report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerBand {
    low: f64,
    high: f64,
}

impl PowerBand {
    /// Build the band for an energy type.
    ///
    /// Producers use the negative convention: `max_power` is the bound with the
    /// larger magnitude, so `max = -1000, min = -300` spans `[-1000, -300]`.
    pub fn new(energy_type: EnergyType, min_power: f64, max_power: f64) -> Self {
        let (a, b) = match energy_type {
            EnergyType::Producer => (-max_power.abs(), -min_power.abs()),
            EnergyType::Consumer => (min_power.abs(), max_power.abs()),
            EnergyType::Combined => (min_power, max_power),
        };
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn clamp(&self, power: f64) -> f64 {
        power.clamp(self.low, self.high)
    }

    /// Uniform draw anywhere in the band.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.low == self.high {
            return self.low;
        }
        rng.gen_range(self.low..=self.high)
    }
}

/// State shared by every generator variant.
struct GeneratorState {
    config: GeneratorConfiguration,
    band: PowerBand,
    previous: Option<Measurement>,
    rng: Box<dyn RngCore + Send>,
    clock: Arc<dyn Clock>,
}

impl GeneratorState {
    fn new(
        config: GeneratorConfiguration,
        rng: Box<dyn RngCore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            band: PowerBand::new(config.energy_type, config.min_power, config.max_power),
            config,
            previous: None,
            rng,
            clock,
        }
    }

    fn seed(&mut self) -> Measurement {
        let measurement = Measurement::zero(SOE_EMPTY, self.clock.now());
        self.previous = Some(measurement);
        measurement
    }

    /// Random walk step with random sign and magnitude up to `max_power_step`.
    /// A non-positive step disables the walk and draws anywhere in the band.
    fn next_power(&mut self, previous_power: f64) -> f64 {
        let max_step = self.config.max_power_step;
        if max_step <= 0.0 {
            return self.band.sample(&mut self.rng);
        }
        let magnitude = self.rng.gen_range(0.0..=max_step);
        let step = if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };
        self.band.clamp(previous_power + step)
    }

    /// Integrate energy between `previous` and a new sample at `power` and store it.
    fn advance(&mut self, previous: Measurement, power: f64) -> Measurement {
        let now = self.clock.now();
        let elapsed_secs = (now - previous.time)
            .to_std()
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0);
        let energy_change = (previous.power.value + power) / 2.0 * elapsed_secs;
        let reference = self.config.reference_power();
        let percent_change = if reference == 0.0 {
            0.0
        } else {
            energy_change / reference * 100.0
        };

        let measurement = Measurement {
            power: Power::watts(power),
            state_of_energy: clamp_soe(previous.state_of_energy + percent_change),
            time: now,
        };
        self.previous = Some(measurement);
        measurement
    }
}

impl fmt::Debug for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorState")
            .field("config", &self.config)
            .field("band", &self.band)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

fn entropy_rng() -> Box<dyn RngCore + Send> {
    Box::new(StdRng::from_entropy())
}

/// Generator for bidirectional assets such as batteries.
///
/// A full asset may not keep charging and an empty one may not keep discharging.
#[derive(Debug)]
pub struct CombinedGenerator {
    state: GeneratorState,
}

impl CombinedGenerator {
    pub fn new(config: GeneratorConfiguration) -> Self {
        Self::with_source(config, entropy_rng(), Arc::new(SystemClock))
    }

    pub fn with_source(
        config: GeneratorConfiguration,
        rng: Box<dyn RngCore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: GeneratorState::new(config, rng, clock),
        }
    }
}

impl MeasurementGenerator for CombinedGenerator {
    fn generate_measurement(&mut self) -> Result<Measurement, GenerationError> {
        let Some(previous) = self.state.previous else {
            return Ok(self.state.seed());
        };

        let mut power = self.state.next_power(previous.power.value);
        let full = previous.state_of_energy >= SOE_FULL && power > 0.0;
        let empty = previous.state_of_energy <= SOE_EMPTY && power < 0.0;
        if full || empty {
            power = 0.0;
        }
        Ok(self.state.advance(previous, power))
    }

    fn energy_type(&self) -> EnergyType {
        EnergyType::Combined
    }
}

/// Generator for assets that only draw power (motors, heaters).
#[derive(Debug)]
pub struct ConsumerGenerator {
    state: GeneratorState,
}

impl ConsumerGenerator {
    pub fn new(config: GeneratorConfiguration) -> Self {
        Self::with_source(config, entropy_rng(), Arc::new(SystemClock))
    }

    pub fn with_source(
        config: GeneratorConfiguration,
        rng: Box<dyn RngCore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: GeneratorState::new(config, rng, clock),
        }
    }
}

impl MeasurementGenerator for ConsumerGenerator {
    fn generate_measurement(&mut self) -> Result<Measurement, GenerationError> {
        let Some(previous) = self.state.previous else {
            return Ok(self.state.seed());
        };
        let power = self.state.next_power(previous.power.value);
        Ok(self.state.advance(previous, power))
    }

    fn energy_type(&self) -> EnergyType {
        EnergyType::Consumer
    }
}

/// Generator for assets that only feed power in (solar, wind, turbines).
#[derive(Debug)]
pub struct ProducerGenerator {
    state: GeneratorState,
}

impl ProducerGenerator {
    pub fn new(config: GeneratorConfiguration) -> Self {
        Self::with_source(config, entropy_rng(), Arc::new(SystemClock))
    }

    pub fn with_source(
        config: GeneratorConfiguration,
        rng: Box<dyn RngCore + Send>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: GeneratorState::new(config, rng, clock),
        }
    }
}

impl MeasurementGenerator for ProducerGenerator {
    fn generate_measurement(&mut self) -> Result<Measurement, GenerationError> {
        let Some(previous) = self.state.previous else {
            return Ok(self.state.seed());
        };
        let power = self.state.next_power(previous.power.value);
        Ok(self.state.advance(previous, power))
    }

    fn energy_type(&self) -> EnergyType {
        EnergyType::Producer
    }
}
