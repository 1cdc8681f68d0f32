//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Simulation runners, worker registry and publishers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Runtime side of the virtual asset simulator.
//!
//! A [`Runner`] steps one generator on a fixed interval and hands every
//! measurement to a [`Publisher`]. The [`SimulatorManager`] keeps at most one
//! running runner per asset id and drains them on shutdown.

pub mod errors;
pub mod manager;
pub mod publisher;
pub mod runner;
pub mod service;

pub use errors::{ManagerError, PublishError, RunnerError, ServiceError};
pub use manager::SimulatorManager;
pub use publisher::{
    ChannelPublisher, JsonLinesPublisher, LogPublisher, MeasurementEnvelope, Publisher,
};
pub use runner::{Runner, RunnerBuilder, RunnerState, PUBLISH_TIMEOUT};
pub use service::{SimulationService, SkippedAsset, StartReport};
