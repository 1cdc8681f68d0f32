//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Maps asset configuration onto generator variants."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use crate::asset::EnergyType;
use crate::clock::Clock;
use crate::configuration::{ConfigurationError, GeneratorConfiguration};
use crate::generator::{
    CombinedGenerator, ConsumerGenerator, MeasurementGenerator, ProducerGenerator,
};

/// Build the generator matching the configured energy type.
///
/// The configuration is validated first; nothing is constructed for an invalid one.
pub fn generator_from_configuration(
    config: &GeneratorConfiguration,
) -> Result<Box<dyn MeasurementGenerator>, ConfigurationError> {
    config.validate()?;
    debug!(asset_id = %config.asset_id, energy_type = %config.energy_type, "creating measurement generator");
    let generator: Box<dyn MeasurementGenerator> = match config.energy_type {
        EnergyType::Combined => Box::new(CombinedGenerator::new(config.clone())),
        EnergyType::Consumer => Box::new(ConsumerGenerator::new(config.clone())),
        EnergyType::Producer => Box::new(ProducerGenerator::new(config.clone())),
    };
    Ok(generator)
}

/// Same as [`generator_from_configuration`] with explicit randomness and time sources.
pub fn generator_with_source(
    config: &GeneratorConfiguration,
    rng: Box<dyn RngCore + Send>,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn MeasurementGenerator>, ConfigurationError> {
    config.validate()?;
    let config = config.clone();
    let generator: Box<dyn MeasurementGenerator> = match config.energy_type {
        EnergyType::Combined => Box::new(CombinedGenerator::with_source(config, rng, clock)),
        EnergyType::Consumer => Box::new(ConsumerGenerator::with_source(config, rng, clock)),
        EnergyType::Producer => Box::new(ProducerGenerator::with_source(config, rng, clock)),
    };
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::asset::AssetType;
    use crate::clock::ManualClock;
    use crate::configuration::AssetConfiguration;

    fn asset(asset_type: AssetType, min: f64, max: f64) -> AssetConfiguration {
        AssetConfiguration {
            asset_id: format!("{asset_type}-1"),
            asset_type,
            measurement_interval: Duration::from_secs(1),
            min_power: min,
            max_power: max,
            max_power_step: 10.0,
        }
    }

    #[test]
    fn selects_variant_by_energy_type() {
        let cases = [
            (asset(AssetType::Battery, -500.0, 500.0), EnergyType::Combined),
            (asset(AssetType::Heater, 0.0, 500.0), EnergyType::Consumer),
            (asset(AssetType::Solar, 0.0, -500.0), EnergyType::Producer),
        ];
        for (asset, expected) in cases {
            let config = asset.to_generator_configuration().unwrap();
            let generator = generator_from_configuration(&config).unwrap();
            assert_eq!(generator.energy_type(), expected);
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = asset(AssetType::Motor, 0.0, 500.0)
            .to_generator_configuration()
            .unwrap();
        config.measurement_interval = Duration::from_millis(50);
        assert!(matches!(
            generator_from_configuration(&config),
            Err(ConfigurationError::IntervalTooShort { .. })
        ));
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let config = asset(AssetType::Battery, -500.0, 500.0)
            .to_generator_configuration()
            .unwrap();
        let clock = Arc::new(ManualClock::default());
        let mut a =
            generator_with_source(&config, Box::new(StdRng::seed_from_u64(9)), clock.clone())
                .unwrap();
        let mut b =
            generator_with_source(&config, Box::new(StdRng::seed_from_u64(9)), clock.clone())
                .unwrap();
        for _ in 0..20 {
            clock.advance(Duration::from_secs(1));
            assert_eq!(
                a.generate_measurement().unwrap(),
                b.generate_measurement().unwrap()
            );
        }
    }
}
