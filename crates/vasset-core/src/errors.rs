//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error types for runners, the manager and publishers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use thiserror::Error;
use vasset_sim::ConfigurationError;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("runner id is required")]
    EmptyId,
    #[error("runner requires a measurement generator")]
    MissingGenerator,
    #[error("runner requires a publisher")]
    MissingPublisher,
    #[error("runner interval {interval:?} must be greater than {minimum:?}")]
    IntervalTooShort { interval: Duration, minimum: Duration },
    #[error("runner {0} is already running")]
    AlreadyRunning(String),
    #[error("runner {0} stopped: context deadline exceeded")]
    DeadlineExceeded(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("worker id is required")]
    EmptyId,
    #[error("worker {0} already exists")]
    AlreadyExists(String),
    #[error("worker {0} doesn't exist")]
    DoesNotExist(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("publisher channel closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
}
