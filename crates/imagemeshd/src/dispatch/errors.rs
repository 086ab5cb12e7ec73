//! Error types for worker dispatch.

use std::io;
use std::time::Duration;

use thiserror::Error;

use imagemesh_wire::WireError;

use crate::cluster::CodecError;

/// Errors surfaced while exchanging a unit with a worker.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker endpoint could not be reached.
    #[error("failed to connect to worker {rank} at {endpoint}: {source}")]
    Connect {
        /// Worker rank.
        rank: usize,
        /// Address that refused or timed out.
        endpoint: String,
        /// Socket failure.
        #[source]
        source: io::Error,
    },

    /// The link broke or returned a malformed frame.
    #[error("link to worker {rank} failed: {source}")]
    Transport {
        /// Worker rank.
        rank: usize,
        /// Frame failure.
        #[source]
        source: WireError,
    },

    /// The worker did not answer within the round-trip budget.
    #[error("worker {rank} did not reply within {}ms", timeout.as_millis())]
    Timeout {
        /// Worker rank.
        rank: usize,
        /// Budget for the whole request and reply exchange.
        timeout: Duration,
    },

    /// The reply answered a different unit.
    #[error("worker {rank} answered ticket {received} while ticket {expected} was outstanding")]
    CorrelationMismatch {
        /// Worker rank.
        rank: usize,
        /// Ticket of the outstanding unit.
        expected: u64,
        /// Ticket the reply carried.
        received: u64,
    },

    /// The worker reported that it could not process the unit.
    #[error("worker {rank} failed to process the unit: {message}")]
    WorkerFailed {
        /// Worker rank.
        rank: usize,
        /// Cause reported by the worker.
        message: String,
    },

    /// Compressing the unit or decompressing the reply failed.
    #[error("payload codec failed for worker {rank}: {source}")]
    Codec {
        /// Worker rank.
        rank: usize,
        /// Codec failure.
        #[source]
        source: CodecError,
    },

    /// A unit named a rank outside the pool.
    #[error("no worker with rank {rank}; the pool holds {workers}")]
    UnknownRank {
        /// Rank the unit named.
        rank: usize,
        /// Size of the pool.
        workers: usize,
    },

    /// The thread driving a unit panicked.
    #[error("dispatch thread for worker {rank} panicked")]
    Panicked {
        /// Worker rank.
        rank: usize,
    },

    /// The dispatcher broke one of its own invariants.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl DispatchError {
    /// Creates an internal error.
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classifies a frame error raised while talking to `rank`.
    ///
    /// Socket timeouts surface as `WouldBlock` or `TimedOut` depending on the
    /// platform; both become [`DispatchError::Timeout`].
    pub(crate) fn from_wire(rank: usize, timeout: Duration, source: WireError) -> Self {
        match &source {
            WireError::Io(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Self::Timeout { rank, timeout }
            }
            _ => Self::Transport { rank, source },
        }
    }

    /// Worker the error concerns, when known.
    pub(crate) fn rank(&self) -> Option<usize> {
        match self {
            Self::Connect { rank, .. }
            | Self::Transport { rank, .. }
            | Self::Timeout { rank, .. }
            | Self::CorrelationMismatch { rank, .. }
            | Self::WorkerFailed { rank, .. }
            | Self::Codec { rank, .. }
            | Self::UnknownRank { rank, .. }
            | Self::Panicked { rank } => Some(*rank),
            Self::Internal { .. } => None,
        }
    }
}
