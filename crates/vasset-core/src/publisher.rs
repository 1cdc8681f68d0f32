//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Measurement publisher contract and in-process publishers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use vasset_sim::Measurement;

use crate::errors::PublishError;

/// Sink for generated measurements.
///
/// Shared by every runner and invoked concurrently.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, measurement: &Measurement, asset_id: &str) -> Result<(), PublishError>;

    /// Human-readable publisher name for logging.
    fn name(&self) -> &'static str;
}

/// Measurement tagged with the asset it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementEnvelope {
    pub asset_id: String,
    pub measurement: Measurement,
}

impl MeasurementEnvelope {
    pub fn new(asset_id: impl Into<String>, measurement: Measurement) -> Self {
        Self {
            asset_id: asset_id.into(),
            measurement,
        }
    }
}

/// Emits every measurement as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, measurement: &Measurement, asset_id: &str) -> Result<(), PublishError> {
        info!(
            target: "vasset::measurement",
            asset_id,
            power_w = measurement.power.value,
            state_of_energy = measurement.state_of_energy,
            time = %measurement.time,
            "measurement"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Forwards envelopes into a bounded in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<MeasurementEnvelope>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MeasurementEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: mpsc::Sender<MeasurementEnvelope>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, measurement: &Measurement, asset_id: &str) -> Result<(), PublishError> {
        self.sender
            .send(MeasurementEnvelope::new(asset_id, *measurement))
            .await
            .map_err(|_| PublishError::Closed)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Appends envelopes to a file, one JSON document per line.
#[derive(Debug)]
pub struct JsonLinesPublisher {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesPublisher {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PublishError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Publisher for JsonLinesPublisher {
    async fn publish(&self, measurement: &Measurement, asset_id: &str) -> Result<(), PublishError> {
        let mut line = serde_json::to_vec(&MeasurementEnvelope::new(asset_id, *measurement))?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }
}
