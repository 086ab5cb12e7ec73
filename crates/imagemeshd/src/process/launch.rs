//! Launch sequencing for the coordinator and worker processes.

use std::sync::Arc;

use tracing::info;

use imagemesh_config::{Config, WorkerConfig};

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{SocketWorkerConnector, WorkerConnector};
use crate::health::HealthReporter;
use crate::telemetry;
use crate::transport::{ServeMode, SocketListener};
use crate::worker::WorkerConnectionHandler;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to run the coordinator.
pub(crate) struct CoordinatorPlan<L, S, C> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) connector: C,
    pub(crate) shutdown: S,
}

/// Runs the coordinator using the production collaborators.
pub fn run_coordinator() -> Result<(), LaunchError> {
    run_coordinator_with(CoordinatorPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        connector: SocketWorkerConnector,
        shutdown: SystemShutdownSignal,
    })
}

/// Runs the coordinator with injected collaborators.
pub(crate) fn run_coordinator_with<L, S, C>(plan: CoordinatorPlan<L, S, C>) -> Result<(), LaunchError>
where
    L: ConfigLoader<Config>,
    S: ShutdownSignal,
    C: WorkerConnector,
{
    let CoordinatorPlan {
        loader,
        reporter,
        connector,
        shutdown,
    } = plan;

    let config = loader.load()?;
    config.listen().prepare_filesystem()?;
    let listener = SocketListener::bind(config.listen())?;

    let static_loader = StaticConfigLoader::new(config.clone());
    let coordinator = bootstrap_with(&static_loader, reporter, &connector)?;
    info!(
        target: PROCESS_TARGET,
        listen = %coordinator.config().listen(),
        workers = coordinator.worker_count(),
        reachable = coordinator.reachable_workers(),
        "coordinator ready"
    );

    let handler = Arc::new(coordinator.into_session_handler());
    let sessions = listener.start(handler, ServeMode::PerConnection);
    let reason = shutdown.wait()?;
    info!(target: PROCESS_TARGET, %reason, "coordinator stopping");
    sessions.shutdown();
    sessions.join()?;
    Ok(())
}

/// Runs a worker using the production collaborators.
pub fn run_worker() -> Result<(), LaunchError> {
    run_worker_with(&SystemConfigLoader, &SystemShutdownSignal)
}

/// Runs a worker with injected collaborators.
pub(crate) fn run_worker_with(
    loader: &dyn ConfigLoader<WorkerConfig>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    config.listen().prepare_filesystem()?;
    let listener = SocketListener::bind(config.listen())?;
    let handler = Arc::new(WorkerConnectionHandler::new(config.max_unit_bytes()));
    let units = listener.start(handler, ServeMode::Serial);
    info!(
        target: PROCESS_TARGET,
        listen = %config.listen(),
        max_unit_bytes = config.max_unit_bytes(),
        "worker ready"
    );
    let reason = shutdown.wait()?;
    info!(target: PROCESS_TARGET, %reason, "worker stopping");
    units.shutdown();
    units.join()?;
    Ok(())
}
