//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation module exports and shared types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Measurement model and stateful telemetry generators for virtual assets.
//!
//! Each simulated asset owns one [`MeasurementGenerator`]; the generator is
//! stepped once per tick and produces the next [`Measurement`] from the
//! previous one.

pub mod asset;
pub mod clock;
pub mod configuration;
pub mod factory;
pub mod generator;
pub mod measurement;

pub use asset::{AssetType, EnergyType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use configuration::{
    AssetConfiguration, ConfigurationError, GeneratorConfiguration, MIN_MEASUREMENT_INTERVAL,
};
pub use factory::{generator_from_configuration, generator_with_source};
pub use generator::{
    CombinedGenerator, ConsumerGenerator, GenerationError, MeasurementGenerator, PowerBand,
    ProducerGenerator,
};
pub use measurement::{Measurement, Power, PowerUnit};
