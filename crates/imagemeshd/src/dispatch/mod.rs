//! Worker dispatch: delivering work units to worker identities.
//!
//! Every worker identity is reached through a [`WorkerLink`]. The
//! [`WorkerPool`] owns one link per configured worker, addressed by rank, and
//! runs plans wave by wave so each worker has at most one outstanding unit.
//! Sessions reach the pool only through the [`DispatchGate`], which
//! serialises access to the whole worker address space.

mod errors;
mod gate;
mod link;
mod pool;

pub use self::errors::DispatchError;
pub(crate) use self::gate::DispatchGate;
pub(crate) use self::link::{
    LinkSettings, SocketWorkerConnector, WorkerConnector, WorkerLink,
};
pub(crate) use self::pool::WorkerPool;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
