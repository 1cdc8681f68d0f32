//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging for the simulator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Process-level plumbing shared by the simulator daemon and tests.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, PublisherConfig, PublisherKind, SimulationConfig,
};
pub use logging::{init_tracing, LogFormat};
