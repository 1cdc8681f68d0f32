//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Turns asset configurations into managed runners."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, warn};
use vasset_rt::RunContext;
use vasset_sim::{
    generator_from_configuration, generator_with_source, AssetConfiguration, MeasurementGenerator,
    SystemClock,
};

use crate::errors::ServiceError;
use crate::manager::SimulatorManager;
use crate::publisher::Publisher;
use crate::runner::Runner;

/// Asset that could not be started, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAsset {
    pub asset_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    pub started: usize,
    pub skipped: Vec<SkippedAsset>,
}

/// Builds runners from asset configurations and hands them to a manager.
pub struct SimulationService {
    manager: SimulatorManager,
    publisher: Arc<dyn Publisher>,
    /// Configuration behind each registered runner, keyed by asset id.
    configurations: Mutex<IndexMap<String, AssetConfiguration>>,
    /// Seeds each new generator when the simulation is reproducible.
    seeds: Option<Mutex<StdRng>>,
}

impl SimulationService {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            manager: SimulatorManager::new(),
            publisher,
            configurations: Mutex::new(IndexMap::new()),
            seeds: None,
        }
    }

    /// Generators are seeded from `seed` in creation order.
    pub fn with_seed(publisher: Arc<dyn Publisher>, seed: u64) -> Self {
        Self {
            seeds: Some(Mutex::new(StdRng::seed_from_u64(seed))),
            ..Self::new(publisher)
        }
    }

    pub fn manager(&self) -> &SimulatorManager {
        &self.manager
    }

    /// Register and start one runner per configuration.
    ///
    /// Invalid or duplicate configurations are logged and reported, never fatal.
    pub fn start_from_configurations(
        &self,
        ctx: &RunContext,
        configs: &[AssetConfiguration],
    ) -> StartReport {
        let mut skipped = Vec::new();
        for config in configs {
            let registered = self
                .build_runner(config)
                .and_then(|runner| self.manager.add_worker(runner).map_err(ServiceError::from));
            match registered {
                Ok(()) => {
                    self.configurations
                        .lock()
                        .insert(config.asset_id.clone(), config.clone());
                }
                Err(err) => {
                    warn!(asset_id = %config.asset_id, error = %err, "skipping asset");
                    skipped.push(SkippedAsset {
                        asset_id: config.asset_id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        let started = self.manager.start_workers(ctx);
        info!(started, skipped = skipped.len(), "simulation started");
        StartReport { started, skipped }
    }

    /// Apply a new or changed configuration, replacing the running asset.
    pub fn apply_configuration(
        &self,
        ctx: &RunContext,
        config: &AssetConfiguration,
    ) -> Result<(), ServiceError> {
        let runner = self.build_runner(config)?;
        self.manager.add_and_start_worker(ctx, runner)?;
        self.configurations
            .lock()
            .insert(config.asset_id.clone(), config.clone());
        info!(asset_id = %config.asset_id, asset_type = %config.asset_type, "configuration applied");
        Ok(())
    }

    pub fn remove_asset(&self, asset_id: &str) -> Result<(), ServiceError> {
        self.manager.remove_worker(asset_id)?;
        self.configurations.lock().shift_remove(asset_id);
        Ok(())
    }

    /// Active configurations in the order their assets were first registered.
    pub fn configurations(&self) -> Vec<AssetConfiguration> {
        self.configurations.lock().values().cloned().collect()
    }

    pub fn configuration(&self, asset_id: &str) -> Option<AssetConfiguration> {
        self.configurations.lock().get(asset_id).cloned()
    }

    /// Stop and remove every asset, waiting for their runners to exit.
    pub async fn shutdown(&self) {
        self.configurations.lock().clear();
        self.manager.remove_all().await;
    }

    fn build_runner(&self, config: &AssetConfiguration) -> Result<Runner, ServiceError> {
        let generator_config = config.to_generator_configuration()?;
        let generator: Box<dyn MeasurementGenerator> = match &self.seeds {
            Some(seeds) => {
                let seed: u64 = seeds.lock().gen();
                generator_with_source(
                    &generator_config,
                    Box::new(StdRng::seed_from_u64(seed)),
                    Arc::new(SystemClock),
                )?
            }
            None => generator_from_configuration(&generator_config)?,
        };
        let runner = Runner::builder()
            .id(generator_config.asset_id.clone())
            .interval(generator_config.measurement_interval)
            .generator(generator)
            .publisher(self.publisher.clone())
            .build()?;
        Ok(runner)
    }
}

impl fmt::Debug for SimulationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationService")
            .field("manager", &self.manager)
            .field("publisher", &self.publisher.name())
            .field("assets", &self.configurations.lock().len())
            .field("seeded", &self.seeds.is_some())
            .finish()
    }
}
