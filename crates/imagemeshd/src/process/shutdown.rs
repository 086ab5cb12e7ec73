//! Blocking waits for the moment a process should stop serving.

use std::fmt;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

/// Why a process left its serving loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A termination signal with this number arrived.
    Signal(i32),
    /// The stop was requested in-process.
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(number) => write!(f, "signal {number}"),
            Self::Requested => f.write_str("request"),
        }
    }
}

/// Blocks the launching thread until the process should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once serving should end.
    ///
    /// # Errors
    ///
    /// Fails when the notification source cannot be installed.
    fn wait(&self) -> io::Result<StopReason>;
}

/// Waits for `SIGTERM`, `SIGINT`, `SIGQUIT` or `SIGHUP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> io::Result<StopReason> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])?;
        Ok(signals
            .forever()
            .next()
            .map_or(StopReason::Requested, StopReason::Signal))
    }
}
