//! Worker process side: the unit loop and the transform catalog.

mod serve;
mod transforms;

pub(crate) use self::serve::{WorkerConnectionHandler, process_unit};
pub use self::transforms::{Operation, TransformOutcome, apply};

pub(crate) const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");
