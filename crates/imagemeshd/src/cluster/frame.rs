//! Unit request and reply frames.

use std::io::{Read, Write};

use imagemesh_config::UnitCodec;
use imagemesh_wire::frame::{read_prefixed, read_u8, read_u64, write_prefixed, write_u64};
use imagemesh_wire::{OperationName, WireError, clamp_message, read_message};

/// One unit of work sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitRequest {
    pub(crate) ticket: u64,
    pub(crate) operation: OperationName,
    pub(crate) codec: UnitCodec,
    pub(crate) quality: u8,
    pub(crate) payload: Vec<u8>,
}

impl UnitRequest {
    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        write_u64(writer, self.ticket)?;
        self.operation.write_to(writer)?;
        writer.write_all(&[self.codec.tag(), self.quality])?;
        write_prefixed(writer, &self.payload)?;
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R, max_payload: u64) -> Result<Self, WireError> {
        let ticket = read_u64(reader, "unit ticket")?;
        let operation = OperationName::read_from(reader)?;
        let codec = read_codec(reader)?;
        let quality = read_u8(reader, "unit quality")?;
        let payload = read_payload(reader, max_payload)?;
        Ok(Self {
            ticket,
            operation,
            codec,
            quality,
            payload,
        })
    }
}

/// Status byte of a unit reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitStatus {
    Transformed,
    PassThrough,
    Failed,
}

impl UnitStatus {
    const fn tag(self) -> u8 {
        match self {
            Self::Transformed => 0,
            Self::PassThrough => 1,
            Self::Failed => 2,
        }
    }

    const fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::Transformed),
            1 => Ok(Self::PassThrough),
            2 => Ok(Self::Failed),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// Content of a unit reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitBody {
    /// The named transform ran.
    Transformed { codec: UnitCodec, payload: Vec<u8> },
    /// The operation is not in the catalog; `payload` is the request payload,
    /// byte for byte.
    PassThrough { codec: UnitCodec, payload: Vec<u8> },
    /// The worker could not process the unit.
    Failed(String),
}

impl UnitBody {
    pub(crate) fn status(&self) -> UnitStatus {
        match self {
            Self::Transformed { .. } => UnitStatus::Transformed,
            Self::PassThrough { .. } => UnitStatus::PassThrough,
            Self::Failed(_) => UnitStatus::Failed,
        }
    }
}

/// The worker's answer to one [`UnitRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitReply {
    pub(crate) ticket: u64,
    pub(crate) body: UnitBody,
}

impl UnitReply {
    pub(crate) fn failed(ticket: u64, message: impl Into<String>) -> Self {
        Self {
            ticket,
            body: UnitBody::Failed(clamp_message(message.into())),
        }
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        write_u64(writer, self.ticket)?;
        writer.write_all(&[self.body.status().tag()])?;
        match &self.body {
            UnitBody::Transformed { codec, payload } | UnitBody::PassThrough { codec, payload } => {
                writer.write_all(&[codec.tag()])?;
                write_prefixed(writer, payload)?;
            }
            UnitBody::Failed(message) => {
                write_prefixed(writer, clamp_message(message.clone()).as_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R, max_payload: u64) -> Result<Self, WireError> {
        let ticket = read_u64(reader, "unit ticket")?;
        let status = UnitStatus::from_tag(read_u8(reader, "unit status")?)?;
        let body = match status {
            UnitStatus::Transformed => UnitBody::Transformed {
                codec: read_codec(reader)?,
                payload: read_payload(reader, max_payload)?,
            },
            UnitStatus::PassThrough => UnitBody::PassThrough {
                codec: read_codec(reader)?,
                payload: read_payload(reader, max_payload)?,
            },
            UnitStatus::Failed => UnitBody::Failed(read_message(reader)?),
        };
        Ok(Self { ticket, body })
    }
}

fn read_codec<R: Read>(reader: &mut R) -> Result<UnitCodec, WireError> {
    let tag = read_u8(reader, "unit codec")?;
    UnitCodec::from_tag(tag).ok_or(WireError::UnknownCodec(tag))
}

fn read_payload<R: Read>(reader: &mut R, max: u64) -> Result<Vec<u8>, WireError> {
    read_prefixed(reader, max, "unit payload", |bytes| {
        WireError::PayloadTooLarge { bytes, max }
    })
}
