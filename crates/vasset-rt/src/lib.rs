//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Runtime helpers supporting the simulation runners."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Scheduling and cancellation helpers for the simulator runtime.

pub mod context;
pub mod scheduling;

pub use context::{ContextError, RunContext};
pub use scheduling::RateLimiter;
