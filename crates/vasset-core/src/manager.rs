//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Registry of simulation runners keyed by asset id."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};
use vasset_rt::RunContext;

use crate::errors::ManagerError;
use crate::runner::{Runner, RunnerState};

#[derive(Debug)]
struct WorkerEntry {
    runner: Arc<Runner>,
    scheduled: bool,
    /// Replaced runners that may still be inside their loop.
    retiring: Vec<Arc<Runner>>,
}

impl WorkerEntry {
    fn all_runners(&self) -> impl Iterator<Item = &Arc<Runner>> {
        self.retiring.iter().chain(std::iter::once(&self.runner))
    }
}

/// Owns every simulation runner of the process.
///
/// The registry lock is only taken for map mutation and never held across an
/// await. Every spawned runner task is tracked so shutdown can drain them.
#[derive(Debug)]
pub struct SimulatorManager {
    workers: Mutex<IndexMap<String, WorkerEntry>>,
    /// Closed for its whole life so `wait` resolves whenever no task is alive.
    tasks: TaskTracker,
}

impl Default for SimulatorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorManager {
    pub fn new() -> Self {
        let tasks = TaskTracker::new();
        tasks.close();
        Self {
            workers: Mutex::new(IndexMap::new()),
            tasks,
        }
    }

    /// Register a runner without starting it.
    pub fn add_worker(&self, runner: impl Into<Arc<Runner>>) -> Result<(), ManagerError> {
        let runner = runner.into();
        let id = checked_id(&runner)?;
        let mut workers = self.workers.lock();
        if workers.contains_key(&id) {
            return Err(ManagerError::AlreadyExists(id));
        }
        debug!(asset_id = %id, "worker registered");
        workers.insert(
            id,
            WorkerEntry {
                runner,
                scheduled: false,
                retiring: Vec::new(),
            },
        );
        Ok(())
    }

    /// Register and start a runner, replacing any worker with the same id.
    ///
    /// The previous runner is stopped first and the new one only enters its
    /// loop after every replaced runner for this id has gone idle.
    pub fn add_and_start_worker(
        &self,
        ctx: &RunContext,
        runner: impl Into<Arc<Runner>>,
    ) -> Result<(), ManagerError> {
        let runner = runner.into();
        let id = checked_id(&runner)?;

        let retiring = {
            let mut workers = self.workers.lock();
            let mut retiring = Vec::new();
            if let Some(previous) = workers.get(&id) {
                if Arc::ptr_eq(&previous.runner, &runner) && previous.scheduled {
                    debug!(asset_id = %id, "worker already scheduled");
                    return Ok(());
                }
                for old in previous.all_runners() {
                    if Arc::ptr_eq(old, &runner) {
                        continue;
                    }
                    old.stop();
                    if old.state() != RunnerState::Stopped {
                        retiring.push(old.clone());
                    }
                }
                info!(asset_id = %id, retiring = retiring.len(), "replacing worker");
            }
            workers.insert(
                id,
                WorkerEntry {
                    runner: runner.clone(),
                    scheduled: true,
                    retiring: retiring.clone(),
                },
            );
            retiring
        };

        self.spawn_runner(ctx, runner, retiring);
        Ok(())
    }

    /// Stop and unregister a worker.
    pub fn remove_worker(&self, id: &str) -> Result<(), ManagerError> {
        let entry = self
            .workers
            .lock()
            .shift_remove(id)
            .ok_or_else(|| ManagerError::DoesNotExist(id.to_owned()))?;
        for runner in entry.all_runners() {
            runner.stop();
        }
        info!(asset_id = %id, "worker removed");
        Ok(())
    }

    /// Start every registered worker that has not been scheduled yet.
    ///
    /// Returns how many workers were started.
    pub fn start_workers(&self, ctx: &RunContext) -> usize {
        let pending: Vec<_> = {
            let mut workers = self.workers.lock();
            workers
                .values_mut()
                .filter(|entry| !entry.scheduled)
                .map(|entry| {
                    entry.scheduled = true;
                    (entry.runner.clone(), entry.retiring.clone())
                })
                .collect()
        };
        let started = pending.len();
        for (runner, retiring) in pending {
            self.spawn_runner(ctx, runner, retiring);
        }
        info!(started, "workers started");
        started
    }

    /// Stop every worker and wait until all runner tasks have exited.
    ///
    /// Safe to call concurrently, and to retry after the future was dropped.
    pub async fn stop_all(&self) {
        let runners: Vec<Arc<Runner>> = self
            .workers
            .lock()
            .values()
            .flat_map(WorkerEntry::all_runners)
            .cloned()
            .collect();
        for runner in &runners {
            runner.stop();
        }
        self.tasks.wait().await;
        info!(workers = runners.len(), "all workers stopped");
    }

    /// Stop every worker, wait for them and clear the registry.
    pub async fn remove_all(&self) {
        let drained: Vec<WorkerEntry> = {
            let mut workers = self.workers.lock();
            workers.drain(..).map(|(_, entry)| entry).collect()
        };
        for runner in drained.iter().flat_map(WorkerEntry::all_runners) {
            runner.stop();
        }
        self.tasks.wait().await;
        info!(workers = drained.len(), "all workers removed");
    }

    pub fn get_worker(&self, id: &str) -> Option<Arc<Runner>> {
        self.workers.lock().get(id).map(|entry| entry.runner.clone())
    }

    /// Registered asset ids in insertion order.
    pub fn workers(&self) -> Vec<String> {
        self.workers.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }

    /// Spawned runner tasks that are still alive.
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn spawn_runner(&self, ctx: &RunContext, runner: Arc<Runner>, retiring: Vec<Arc<Runner>>) {
        let ctx = ctx.clone();
        self.tasks.spawn(async move {
            for old in &retiring {
                old.wait_idle().await;
            }
            if let Err(err) = runner.start(&ctx).await {
                error!(asset_id = %runner.id(), error = %err, "worker exited with error");
            }
        });
    }
}

fn checked_id(runner: &Runner) -> Result<String, ManagerError> {
    let id = runner.id();
    if id.trim().is_empty() {
        return Err(ManagerError::EmptyId);
    }
    Ok(id.to_owned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use vasset_sim::{
        generator_from_configuration, EnergyType, GeneratorConfiguration, Measurement,
    };

    use super::*;
    use crate::errors::PublishError;
    use crate::publisher::Publisher;

    struct NullPublisher;

    #[async_trait]
    impl Publisher for NullPublisher {
        async fn publish(&self, _: &Measurement, _: &str) -> Result<(), PublishError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "null"
        }
    }

    /// Holds every publish for three seconds, below the publish timeout.
    struct SlowPublisher;

    #[async_trait]
    impl Publisher for SlowPublisher {
        async fn publish(&self, _: &Measurement, _: &str) -> Result<(), PublishError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn runner(id: &str) -> Runner {
        runner_with(id, Arc::new(NullPublisher))
    }

    fn runner_with(id: &str, publisher: Arc<dyn Publisher>) -> Runner {
        let config = GeneratorConfiguration {
            asset_id: id.into(),
            energy_type: EnergyType::Consumer,
            min_power: 0.0,
            max_power: 500.0,
            max_power_step: 50.0,
            measurement_interval: Duration::from_millis(200),
        };
        Runner::new(
            id,
            config.measurement_interval,
            generator_from_configuration(&config).unwrap(),
            publisher,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let manager = SimulatorManager::new();
        manager.add_worker(runner("motor-1")).unwrap();
        let err = manager.add_worker(runner("motor-1")).unwrap_err();
        assert_eq!(err, ManagerError::AlreadyExists("motor-1".into()));
        assert!(err.to_string().contains("already exists"));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn removing_unknown_worker_leaves_registry_unchanged() {
        let manager = SimulatorManager::new();
        manager.add_worker(runner("motor-1")).unwrap();
        let err = manager.remove_worker("ghost").unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));
        assert_eq!(manager.workers(), vec!["motor-1".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_workers_only_starts_pending_ones() {
        let manager = SimulatorManager::new();
        manager.add_worker(runner("a")).unwrap();
        manager.add_worker(runner("b")).unwrap();
        let ctx = RunContext::new();
        assert_eq!(manager.start_workers(&ctx), 2);
        assert_eq!(manager.start_workers(&ctx), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.get_worker("a").unwrap().is_running());
        assert!(manager.get_worker("b").unwrap().is_running());

        manager.stop_all().await;
        assert!(!manager.get_worker("a").unwrap().is_running());
        assert_eq!(manager.active_tasks(), 0);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_waits_for_previous_runner() {
        let manager = SimulatorManager::new();
        let ctx = RunContext::new();
        let first = Arc::new(runner("battery-1"));
        manager.add_and_start_worker(&ctx, first.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(first.is_running());

        let second = Arc::new(runner("battery-1"));
        manager.add_and_start_worker(&ctx, second.clone()).unwrap();
        while !second.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!first.is_running());
        assert_eq!(first.state(), RunnerState::Stopped);
        assert!(Arc::ptr_eq(&manager.get_worker("battery-1").unwrap(), &second));
        assert_eq!(manager.len(), 1);

        manager.remove_all().await;
        assert!(manager.is_empty());
        assert!(!second.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_replacements_keep_one_runner_alive() {
        let manager = SimulatorManager::new();
        let ctx = RunContext::new();
        let runners: Vec<_> = (0..4).map(|_| Arc::new(runner("heater-1"))).collect();
        for candidate in &runners {
            manager.add_and_start_worker(&ctx, candidate.clone()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        let running = runners.iter().filter(|r| r.is_running()).count();
        assert_eq!(running, 1);
        assert!(runners[3].is_running());

        manager.stop_all().await;
        assert!(runners.iter().all(|r| !r.is_running()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn remove_worker_stops_the_runner() {
        let manager = SimulatorManager::new();
        let ctx = RunContext::new();
        let worker = Arc::new(runner("solar-1"));
        manager.add_and_start_worker(&ctx, worker.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.remove_worker("solar-1").unwrap();
        worker.wait_idle().await;
        assert!(!worker.is_running());
        assert!(manager.get_worker("solar-1").is_none());
        manager.stop_all().await;
    }

    /// Starts one runner and lets it enter a publish that lasts until 3.2s.
    async fn manager_inside_slow_publish() -> (Arc<SimulatorManager>, Arc<Runner>) {
        let manager = Arc::new(SimulatorManager::new());
        let worker = Arc::new(runner_with("motor-9", Arc::new(SlowPublisher)));
        manager
            .add_and_start_worker(&RunContext::new(), worker.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(worker.is_running());
        (manager, worker)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_stop_all_waits_for_in_flight_publish() {
        let (manager, worker) = manager_inside_slow_publish().await;

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.stop_all().await }
        });
        tokio::task::yield_now().await;
        manager.stop_all().await;
        assert!(!worker.is_running());
        assert_eq!(manager.active_tasks(), 0);

        first.await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_can_be_retried_after_a_timeout() {
        let (manager, worker) = manager_inside_slow_publish().await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), manager.stop_all()).await;
        assert!(abandoned.is_err());
        assert!(worker.is_running());
        assert_eq!(manager.active_tasks(), 1);

        manager.stop_all().await;
        assert!(!worker.is_running());
        assert_eq!(manager.active_tasks(), 0);
    }
}
