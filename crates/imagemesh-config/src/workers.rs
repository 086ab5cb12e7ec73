//! Static worker address list.
//!
//! The coordinator addresses its worker pool by rank. Rank `0` is the
//! coordinator itself; rank `n` (for `n >= 1`) is the `n`-th entry of this
//! list. The list is fixed at launch and never resized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::socket::{SocketEndpoint, SocketParseError};

/// Ordered worker endpoints, written as a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerEndpoints(Vec<SocketEndpoint>);

impl WorkerEndpoints {
    /// Builds the list from explicit endpoints.
    #[must_use]
    pub const fn new(endpoints: Vec<SocketEndpoint>) -> Self {
        Self(endpoints)
    }

    /// Number of worker identities available for transform work.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no worker is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(rank, endpoint)` pairs with ranks starting at `1`.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &SocketEndpoint)> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, endpoint)| (index + 1, endpoint))
    }

    /// Endpoints in rank order.
    #[must_use]
    pub fn as_slice(&self) -> &[SocketEndpoint] {
        &self.0
    }
}

impl fmt::Display for WorkerEndpoints {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, endpoint) in self.0.iter().enumerate() {
            if index > 0 {
                formatter.write_str(",")?;
            }
            write!(formatter, "{endpoint}")?;
        }
        Ok(())
    }
}

impl FromStr for WorkerEndpoints {
    type Err = WorkerEndpointsError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .parse::<SocketEndpoint>()
                    .map_err(|source| WorkerEndpointsError::Endpoint {
                        rank: index + 1,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<String> for WorkerEndpoints {
    type Error = WorkerEndpointsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkerEndpoints> for String {
    fn from(value: WorkerEndpoints) -> Self {
        value.to_string()
    }
}

/// Errors raised while parsing a worker endpoint list.
#[derive(Debug, Error)]
pub enum WorkerEndpointsError {
    /// One entry of the list was not a valid endpoint.
    #[error("worker endpoint for rank {rank} is invalid: {source}")]
    Endpoint {
        /// Rank the entry would have taken.
        rank: usize,
        /// Parse failure for the entry.
        #[source]
        source: SocketParseError,
    },
}
