//! Bootstrap test world: loader, reporter, workers and bootstrap outcome.

use std::cell::RefCell;
use std::sync::Arc;

use imagemesh_config::{Config, SocketEndpoint};

use crate::bootstrap::{BootstrapError, ConfigLoader, Coordinator, bootstrap_with};
use crate::dispatch::SocketWorkerConnector;

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;
use super::workers::{LoopbackWorker, closed_endpoint};

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader<Config>>,
    pub reporter: Arc<RecordingHealthReporter>,
    workers: Vec<LoopbackWorker>,
    endpoints: Vec<SocketEndpoint>,
    coordinator: Option<Coordinator>,
    bootstrap_error: Option<BootstrapError>,
}

impl TestWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new(Vec::new())),
            reporter: Arc::new(RecordingHealthReporter::default()),
            workers: Vec::new(),
            endpoints: Vec::new(),
            coordinator: None,
            bootstrap_error: None,
        }
    }

    /// Starts `count` loopback workers and appends them to the rank list.
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker = LoopbackWorker::start();
            self.endpoints.push(worker.endpoint());
            self.workers.push(worker);
        }
    }

    /// Appends a rank whose endpoint has nothing listening.
    pub fn add_unreachable_worker(&mut self) {
        self.endpoints.push(closed_endpoint());
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader listing the workers started so far.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new(self.endpoints.clone()));
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.coordinator.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        let reporter = Arc::clone(&self.reporter);
        match bootstrap_with(&*self.loader, reporter, &SocketWorkerConnector) {
            Ok(coordinator) => self.coordinator = Some(coordinator),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }

    fn reset_results(&mut self) {
        self.coordinator = None;
        self.bootstrap_error = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
