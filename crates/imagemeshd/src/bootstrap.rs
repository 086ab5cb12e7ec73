//! Coordinator bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::warn;

use imagemesh_config::{Config, SocketPreparationError, WorkerConfig};

use crate::dispatch::{DISPATCH_TARGET, DispatchGate, LinkSettings, WorkerConnector, WorkerPool};
use crate::health::HealthReporter;
use crate::session::{SessionConnectionHandler, SessionSettings};
use crate::telemetry::{self, TelemetryError};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader<C>: Send + Sync {
    /// Loads a process configuration.
    fn load(&self) -> Result<C, Arc<OrthoError>>;
}

/// Loader that delegates to the layered `ortho_config` sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader<Config> for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

impl ConfigLoader<WorkerConfig> for SystemConfigLoader {
    fn load(&self) -> Result<WorkerConfig, Arc<OrthoError>> {
        WorkerConfig::load()
    }
}

/// Loader returning a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader<C> {
    config: C,
}

impl<C> StaticConfigLoader<C> {
    /// Wraps an already-resolved configuration.
    #[must_use]
    pub const fn new(config: C) -> Self {
        Self { config }
    }
}

impl<C> ConfigLoader<C> for StaticConfigLoader<C>
where
    C: Clone + Send + Sync,
{
    fn load(&self) -> Result<C, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listening socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful coordinator bootstrap.
pub(crate) struct Coordinator {
    config: Config,
    pool: WorkerPool,
    reachable: usize,
}

impl Coordinator {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub(crate) const fn config(&self) -> &Config {
        &self.config
    }

    /// Workers that accepted a connection during bootstrap.
    #[must_use]
    pub(crate) const fn reachable_workers(&self) -> usize {
        self.reachable
    }

    /// Number of configured worker identities.
    #[must_use]
    pub(crate) const fn worker_count(&self) -> usize {
        self.pool.len()
    }

    /// Consumes the coordinator into the handler serving client sessions.
    pub(crate) fn into_session_handler(self) -> SessionConnectionHandler {
        let settings = SessionSettings::from_config(&self.config);
        SessionConnectionHandler::new(DispatchGate::new(self.pool), settings)
    }
}

/// Bootstraps the coordinator using the supplied collaborators.
///
/// Every configured worker is contacted once. Unreachable workers are reported
/// but do not fail bootstrap; their links reconnect on first use.
pub(crate) fn bootstrap_with(
    loader: &dyn ConfigLoader<Config>,
    reporter: Arc<dyn HealthReporter>,
    connector: &dyn WorkerConnector,
) -> Result<Coordinator, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = telemetry::initialise(&config) {
        let error = BootstrapError::Telemetry { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    if let Err(source) = config.listen().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let settings = LinkSettings::from_config(&config);
    let links = config
        .workers()
        .ranked()
        .map(|(rank, endpoint)| connector.link(rank, endpoint, settings))
        .collect();
    if config.workers().is_empty() {
        warn!(
            target: DISPATCH_TARGET,
            "no workers configured; every request will be answered with a failure"
        );
    }
    let mut pool = WorkerPool::new(links, Arc::clone(&reporter));
    let reachable = pool.connect_all();
    reporter.bootstrap_succeeded(&config);

    Ok(Coordinator {
        config,
        pool,
        reachable,
    })
}
