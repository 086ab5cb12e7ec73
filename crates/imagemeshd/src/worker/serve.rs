//! Blocking receive, transform, reply loop for one coordinator link.

use std::time::Instant;

use tracing::{debug, info, warn};

use imagemesh_wire::WireError;

use crate::cluster::{UnitBody, UnitEncoding, UnitReply, UnitRequest};
use crate::cluster::{decode_dynamic, encode_dynamic};
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::WORKER_TARGET;
use super::transforms::{TransformOutcome, apply};

/// Serves units arriving on a coordinator connection until it closes.
///
/// The loop holds no state between units. Every unit is answered, including
/// ones that cannot be decoded, so the coordinator never waits on a reply
/// that will not come.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerConnectionHandler {
    max_unit_bytes: u64,
}

impl WorkerConnectionHandler {
    pub(crate) const fn new(max_unit_bytes: u64) -> Self {
        Self { max_unit_bytes }
    }

    fn serve(&self, stream: &mut ConnectionStream) -> Result<u64, WireError> {
        let mut served = 0_u64;
        loop {
            let request = match UnitRequest::read_from(stream, self.max_unit_bytes) {
                Ok(request) => request,
                Err(WireError::Truncated { received: 0, .. }) => return Ok(served),
                Err(error) => return Err(error),
            };
            let started = Instant::now();
            let reply = process_unit(&request);
            reply.write_to(stream)?;
            served = served.saturating_add(1);
            debug!(
                target: WORKER_TARGET,
                ticket = request.ticket,
                operation = %request.operation,
                status = ?reply.body.status(),
                elapsed_ms = started.elapsed().as_millis(),
                "unit processed"
            );
        }
    }
}

impl ConnectionHandler for WorkerConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let peer = stream.peer();
        info!(target: WORKER_TARGET, %peer, "coordinator connected");
        match self.serve(&mut stream) {
            Ok(units) => info!(
                target: WORKER_TARGET,
                %peer,
                units,
                "coordinator disconnected"
            ),
            Err(error) => warn!(
                target: WORKER_TARGET,
                %peer,
                %error,
                "coordinator link failed"
            ),
        }
        stream.close();
    }
}

/// Decodes, transforms and re-encodes one unit.
///
/// An operation outside the catalog echoes the request payload byte for byte
/// rather than re-encoding it, so lossy codecs cannot alter a pass-through.
/// Failures become a [`UnitBody::Failed`] reply carrying the cause.
pub(crate) fn process_unit(request: &UnitRequest) -> UnitReply {
    let ticket = request.ticket;
    let image = match decode_dynamic(&request.payload, request.codec) {
        Ok(image) => image,
        Err(error) => return UnitReply::failed(ticket, error.to_string()),
    };
    let transformed = match apply(request.operation.as_str(), image) {
        TransformOutcome::Transformed(transformed) => transformed,
        TransformOutcome::PassThrough(_) => {
            debug!(
                target: WORKER_TARGET,
                operation = %request.operation,
                "operation not in catalog; echoing input"
            );
            return UnitReply {
                ticket,
                body: UnitBody::PassThrough {
                    codec: request.codec,
                    payload: request.payload.clone(),
                },
            };
        }
    };
    let encoding = UnitEncoding::new(request.codec, request.quality);
    match encode_dynamic(&transformed, encoding) {
        Ok(payload) => UnitReply {
            ticket,
            body: UnitBody::Transformed {
                codec: request.codec,
                payload,
            },
        },
        Err(error) => UnitReply::failed(ticket, error.to_string()),
    }
}
