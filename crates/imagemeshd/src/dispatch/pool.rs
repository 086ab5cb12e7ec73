//! Fixed pool of worker links addressed by rank.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use imagemesh_wire::OperationName;

use crate::assemble::UnitResult;
use crate::cluster::{UnitBody, UnitEncoding, UnitRequest, decode_payload, encode_image};
use crate::health::HealthReporter;
use crate::plan::{PartitionPlan, WorkUnit};

use super::{DISPATCH_TARGET, DispatchError, WorkerLink};

/// Bounded set of worker identities, one link per rank.
pub(crate) struct WorkerPool {
    links: Vec<Box<dyn WorkerLink>>,
    next_ticket: u64,
    reporter: Arc<dyn HealthReporter>,
}

impl WorkerPool {
    /// Builds a pool; `links[0]` must serve rank 1.
    pub(crate) fn new(links: Vec<Box<dyn WorkerLink>>, reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            links,
            next_ticket: 0,
            reporter,
        }
    }

    /// Number of worker identities.
    pub(crate) const fn len(&self) -> usize {
        self.links.len()
    }

    /// Opens every link once, reporting which workers are reachable.
    ///
    /// Unreachable workers are not fatal; their links retry on first use.
    pub(crate) fn connect_all(&mut self) -> usize {
        let mut connected = 0_usize;
        for link in &mut self.links {
            match link.ensure_connected() {
                Ok(()) => {
                    connected = connected.saturating_add(1);
                    self.reporter.worker_connected(link.rank(), &link.endpoint());
                }
                Err(error) => self.reporter.worker_failed(link.rank(), &error),
            }
        }
        connected
    }

    /// Drops every open connection so the next unit reconnects.
    pub(crate) fn reset_links(&mut self) {
        for link in &mut self.links {
            link.reset();
        }
    }

    /// Runs every unit of `plan` and returns the decoded results.
    ///
    /// Waves run one after another; within a wave every unit goes to a
    /// different worker and all of them are in flight together.
    pub(crate) fn dispatch(
        &mut self,
        plan: &PartitionPlan,
        operation: &OperationName,
        encoding: UnitEncoding,
    ) -> Result<Vec<UnitResult>, DispatchError> {
        let mut results = Vec::with_capacity(plan.units().len());
        for (wave_index, wave) in plan.waves().enumerate() {
            debug!(
                target: DISPATCH_TARGET,
                wave = wave_index,
                units = wave.len(),
                "dispatching wave"
            );
            for outcome in self.run_wave(wave, operation, encoding)? {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(error) => {
                        if let Some(rank) = error.rank() {
                            self.reporter.worker_failed(rank, &error);
                        }
                        return Err(error);
                    }
                }
            }
        }
        Ok(results)
    }

    fn run_wave(
        &mut self,
        wave: &[WorkUnit],
        operation: &OperationName,
        encoding: UnitEncoding,
    ) -> Result<Vec<Result<UnitResult, DispatchError>>, DispatchError> {
        let workers = self.links.len();
        let mut assignments: Vec<Option<(&WorkUnit, u64)>> = vec![None; workers];
        for unit in wave {
            let rank = unit.rank();
            let slot = rank
                .checked_sub(1)
                .and_then(|index| assignments.get_mut(index))
                .ok_or(DispatchError::UnknownRank { rank, workers })?;
            if slot.is_some() {
                return Err(DispatchError::internal(format!(
                    "worker {rank} addressed twice in one wave"
                )));
            }
            self.next_ticket = self.next_ticket.wrapping_add(1);
            *slot = Some((unit, self.next_ticket));
        }

        let outcomes: Vec<Result<UnitResult, DispatchError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .links
                .iter_mut()
                .zip(assignments)
                .filter_map(|(link, assignment)| {
                    assignment.map(|(unit, ticket)| {
                        let rank = unit.rank();
                        let handle = scope
                            .spawn(move || exchange(link.as_mut(), unit, operation, encoding, ticket));
                        (rank, handle)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(DispatchError::Panicked { rank }))
                })
                .collect()
        });
        Ok(outcomes)
    }
}

fn exchange(
    link: &mut dyn WorkerLink,
    unit: &WorkUnit,
    operation: &OperationName,
    encoding: UnitEncoding,
    ticket: u64,
) -> Result<UnitResult, DispatchError> {
    let rank = link.rank();
    let payload = encode_image(unit.image(), encoding)
        .map_err(|source| DispatchError::Codec { rank, source })?;
    let request = UnitRequest {
        ticket,
        operation: operation.clone(),
        codec: encoding.codec,
        quality: encoding.quality,
        payload,
    };
    let reply = link.round_trip(&request)?;
    if reply.ticket != ticket {
        link.reset();
        return Err(DispatchError::CorrelationMismatch {
            rank,
            expected: ticket,
            received: reply.ticket,
        });
    }
    let (image, passed_through) = match reply.body {
        UnitBody::Transformed { codec, payload } => {
            let decoded = decode_payload(&payload, codec)
                .map_err(|source| DispatchError::Codec { rank, source })?;
            (decoded, false)
        }
        UnitBody::PassThrough { .. } => {
            info!(
                target: DISPATCH_TARGET,
                rank,
                operation = %operation,
                "operation not in the transform catalog; input returned unchanged"
            );
            (unit.image().clone(), true)
        }
        UnitBody::Failed(message) => return Err(DispatchError::WorkerFailed { rank, message }),
    };
    Ok(UnitResult {
        position: unit.position(),
        rank,
        image,
        passed_through,
    })
}
