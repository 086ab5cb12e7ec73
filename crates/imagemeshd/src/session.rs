//! Client sessions: one accepted connection from request to response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use thiserror::Error;
use tracing::{Span, debug, field, info, info_span, warn};

use imagemesh_config::Config;
use imagemesh_wire::{FrameLimits, Image, OperationName, Request, Response, WireError};

use crate::assemble::{Assembler, AssemblyError};
use crate::cluster::UnitEncoding;
use crate::dispatch::{DispatchError, DispatchGate, WorkerPool};
use crate::plan::{PartitionPlan, PlanError};
use crate::transport::{ConnectionHandler, ConnectionStream};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Everything that can end a session early.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl SessionError {
    /// Response telling the client why its request ended, if the
    /// connection can still carry one.
    pub(crate) fn response(&self) -> Option<Response> {
        match self {
            Self::Wire(error) if error.is_transport() => None,
            Self::Wire(error) => Some(Response::rejected(error.to_string())),
            Self::Plan(PlanError::NoImages | PlanError::EmptyImage) => {
                Some(Response::rejected(self.to_string()))
            }
            Self::Plan(PlanError::NoWorkers) | Self::Dispatch(_) | Self::Assembly(_) => {
                Some(Response::failed(self.to_string()))
            }
        }
    }
}

/// Per-session settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionSettings {
    pub(crate) limits: FrameLimits,
    pub(crate) encoding: UnitEncoding,
}

impl SessionSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            limits: FrameLimits {
                max_images: config.max_images(),
                max_image_bytes: config.max_image_bytes(),
            },
            encoding: UnitEncoding::new(config.unit_codec(), config.jpeg_quality()),
        }
    }
}

/// Plans, dispatches and reassembles one decoded request.
///
/// Runs with exclusive access to the worker pool.
pub(crate) fn execute(
    pool: &mut WorkerPool,
    operation: &OperationName,
    images: Vec<Image>,
    encoding: UnitEncoding,
) -> Result<Vec<Image>, SessionError> {
    let plan = PartitionPlan::build(images, pool.len())?;
    debug!(
        target: SESSION_TARGET,
        mode = ?plan.mode(),
        units = plan.units().len(),
        workers = plan.workers_used(),
        "request partitioned"
    );
    let results = pool.dispatch(&plan, operation, encoding)?;
    let mut assembler = Assembler::new(plan.mode(), plan.units().len());
    for result in results {
        if result.passed_through {
            debug!(
                target: SESSION_TARGET,
                position = result.position,
                rank = result.rank,
                "unit passed through unchanged"
            );
        }
        assembler.accept(result)?;
    }
    Ok(assembler.finish()?)
}

/// Connection handler running one session per accepted client.
pub(crate) struct SessionConnectionHandler {
    gate: DispatchGate,
    settings: SessionSettings,
    next_session: AtomicU64,
}

impl SessionConnectionHandler {
    pub(crate) fn new(gate: DispatchGate, settings: SessionSettings) -> Self {
        Self {
            gate,
            settings,
            next_session: AtomicU64::new(1),
        }
    }

    fn run(&self, stream: &mut ConnectionStream, started: Instant) -> Result<Vec<Image>, SessionError> {
        let request = Request::read_from(stream, self.settings.limits)?;
        let (operation, images) = request.into_parts();
        Span::current().record("operation", operation.as_str());
        info!(
            target: SESSION_TARGET,
            images = images.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "images received"
        );
        let encoding = self.settings.encoding;
        let processed = self
            .gate
            .with_pool(|pool| execute(pool, &operation, images, encoding))?;
        info!(
            target: SESSION_TARGET,
            images = processed.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "results received"
        );
        Ok(processed)
    }
}

impl ConnectionHandler for SessionConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let span = info_span!(
            target: SESSION_TARGET,
            "session",
            id,
            peer = %stream.peer(),
            operation = field::Empty
        );
        let _entered = span.enter();
        let started = Instant::now();
        info!(target: SESSION_TARGET, "connection made");

        let response = match self.run(&mut stream, started) {
            Ok(images) => Response::Images(images),
            Err(error) => {
                warn!(target: SESSION_TARGET, %error, "session failed");
                match error.response() {
                    Some(response) => response,
                    None => {
                        stream.close();
                        return;
                    }
                }
            }
        };
        match response.write_to(&mut stream) {
            Ok(()) => info!(
                target: SESSION_TARGET,
                status = ?response.status(),
                elapsed_ms = started.elapsed().as_millis(),
                "results sent"
            ),
            Err(error) => warn!(target: SESSION_TARGET, %error, "failed to send response"),
        }
        stream.close();
        debug!(
            target: SESSION_TARGET,
            elapsed_ms = started.elapsed().as_millis(),
            "connection closed"
        );
    }
}
