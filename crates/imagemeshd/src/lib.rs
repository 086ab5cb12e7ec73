//! Coordinator and worker runtime for the imagemesh image-processing cluster.
//!
//! A coordinator accepts client sessions over a configured socket, splits the
//! submitted images into work units, and fans the units out to a fixed set of
//! worker processes addressed by rank. Each worker decodes its unit, applies
//! the requested transform and replies with the processed pixels. The
//! coordinator reassembles the results in submission order and answers the
//! client with a single response frame.
//!
//! Requests are planned in one of two modes:
//!
//! 1. **Row chunks**: a single image is split into contiguous row bands, one
//!    per worker, and the processed bands are stacked back together.
//! 2. **Multi image**: several images are assigned to workers round-robin and
//!    returned whole.
//!
//! One session at a time owns the worker pool. Further sessions queue on the
//! dispatch gate, so every worker has at most one unit in flight.

mod assemble;
mod bootstrap;
mod cluster;
mod dispatch;
mod health;
mod plan;
mod process;
mod session;
mod telemetry;
mod transport;
mod worker;

pub use bootstrap::{BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use cluster::CodecError;
pub use dispatch::DispatchError;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_coordinator, run_worker};
pub use telemetry::{LogSettings, TelemetryError, TelemetryHandle};
pub use worker::{Operation, TransformOutcome, apply};

#[cfg(test)]
mod tests;
