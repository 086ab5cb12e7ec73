//! Result assembly: rebuilding the client-visible images from unit results.

use thiserror::Error;
use tracing::debug;

use imagemesh_wire::{CHANNELS, Image};

use crate::plan::PlanMode;

const ASSEMBLY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// A decoded worker result tagged with its plan position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitResult {
    pub(crate) position: usize,
    pub(crate) rank: usize,
    pub(crate) image: Image,
    pub(crate) passed_through: bool,
}

/// Errors raised while merging results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum AssemblyError {
    #[error("received {received} of {expected} unit results")]
    Incomplete { expected: usize, received: usize },
    #[error("unit position {position} was returned twice")]
    DuplicatePosition { position: usize },
    #[error("unit position {position} is outside the plan of {expected} units")]
    UnexpectedPosition { position: usize, expected: usize },
    #[error("chunk {position} is {actual} columns wide; earlier chunks are {expected}")]
    ChunkWidthMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },
    #[error("merged image is inconsistent: {0}")]
    Inconsistent(String),
}

/// Collects unit results in any order and merges them by position.
#[derive(Debug)]
pub(crate) struct Assembler {
    mode: PlanMode,
    slots: Vec<Option<Image>>,
}

impl Assembler {
    pub(crate) fn new(mode: PlanMode, expected_units: usize) -> Self {
        Self {
            mode,
            slots: vec![None; expected_units],
        }
    }

    /// Stores one result, rejecting positions outside the plan or repeats.
    pub(crate) fn accept(&mut self, result: UnitResult) -> Result<(), AssemblyError> {
        let expected = self.slots.len();
        let slot = self
            .slots
            .get_mut(result.position)
            .ok_or(AssemblyError::UnexpectedPosition {
                position: result.position,
                expected,
            })?;
        if slot.is_some() {
            return Err(AssemblyError::DuplicatePosition {
                position: result.position,
            });
        }
        *slot = Some(result.image);
        Ok(())
    }

    /// Produces the response images once every position has a result.
    pub(crate) fn finish(self) -> Result<Vec<Image>, AssemblyError> {
        let expected = self.slots.len();
        let received = self.slots.iter().filter(|slot| slot.is_some()).count();
        let images: Vec<Image> = self.slots.into_iter().flatten().collect();
        if images.len() != expected {
            return Err(AssemblyError::Incomplete { expected, received });
        }
        match self.mode {
            PlanMode::MultiImage { .. } => Ok(images),
            PlanMode::RowChunks {
                source_rows,
                source_cols,
            } => {
                let merged = concatenate_rows(images)?;
                if (merged.rows(), merged.cols()) != (source_rows, source_cols) {
                    debug!(
                        target: ASSEMBLY_TARGET,
                        source_rows,
                        source_cols,
                        rows = merged.rows(),
                        cols = merged.cols(),
                        "transform changed the image shape"
                    );
                }
                Ok(vec![merged])
            }
        }
    }
}

fn concatenate_rows(chunks: Vec<Image>) -> Result<Image, AssemblyError> {
    let cols = chunks.first().map_or(0, Image::cols);
    let rows = chunks.iter().map(Image::rows).sum::<usize>();
    let mut pixels = Vec::with_capacity(rows * cols * CHANNELS);
    for (position, chunk) in chunks.into_iter().enumerate() {
        if chunk.cols() != cols {
            return Err(AssemblyError::ChunkWidthMismatch {
                position,
                expected: cols,
                actual: chunk.cols(),
            });
        }
        pixels.extend_from_slice(chunk.pixels());
    }
    Image::new(rows, cols, pixels).map_err(|error| AssemblyError::Inconsistent(error.to_string()))
}
