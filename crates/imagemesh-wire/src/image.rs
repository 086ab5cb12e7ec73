//! Decoded pixel buffers and their framing.

use std::io::{Read, Write};
use std::ops::Range;

use crate::WireError;
use crate::frame::{fill, len_to_u64, read_u64, write_u64};

/// Bytes per pixel: three interleaved 8-bit channels.
pub const CHANNELS: usize = 3;

/// Row-major, three-channel, 8-bit image.
///
/// The buffer length always equals `rows * cols * CHANNELS`; constructors
/// enforce it so the shape can never disagree with the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    rows: usize,
    cols: usize,
    pixels: Vec<u8>,
}

impl Image {
    /// Wraps a pixel buffer after checking it matches the shape.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::ShapeMismatch`] when the buffer length is wrong.
    pub fn new(rows: usize, cols: usize, pixels: Vec<u8>) -> Result<Self, WireError> {
        let expected = byte_len(rows, cols).ok_or(WireError::ShapeMismatch {
            rows,
            cols,
            expected: usize::MAX,
            actual: pixels.len(),
        })?;
        if pixels.len() != expected {
            return Err(WireError::ShapeMismatch {
                rows,
                cols,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { rows, cols, pixels })
    }

    /// Number of rows (image height).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (image width).
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Raw interleaved pixel bytes.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes in one row.
    #[must_use]
    pub const fn row_stride(&self) -> usize {
        self.cols * CHANNELS
    }

    /// Copies a contiguous band of rows into a new image.
    ///
    /// Returns `None` when the range is empty or extends past the last row.
    #[must_use]
    pub fn row_band(&self, range: Range<usize>) -> Option<Self> {
        if range.start >= range.end || range.end > self.rows {
            return None;
        }
        let stride = self.row_stride();
        let bytes = self.pixels.get(range.start * stride..range.end * stride)?;
        Some(Self {
            rows: range.end - range.start,
            cols: self.cols,
            pixels: bytes.to_vec(),
        })
    }

    /// Reads one framed image: rows, cols, then `rows * cols * 3` bytes.
    ///
    /// `index` names the image in errors; `max_bytes` bounds the allocation.
    ///
    /// # Errors
    ///
    /// Returns decode errors for empty or oversized shapes and transport
    /// errors when the stream ends early.
    pub fn read_from<R: Read>(
        reader: &mut R,
        index: usize,
        max_bytes: u64,
    ) -> Result<Self, WireError> {
        let declared_rows = read_u64(reader, "image rows")?;
        let declared_cols = read_u64(reader, "image cols")?;
        if declared_rows == 0 || declared_cols == 0 {
            return Err(WireError::EmptyImage {
                index,
                rows: declared_rows,
                cols: declared_cols,
            });
        }
        let bytes = u128::from(declared_rows) * u128::from(declared_cols) * CHANNELS as u128;
        let too_large = WireError::ImageTooLarge {
            index,
            bytes,
            max: max_bytes,
        };
        if bytes > u128::from(max_bytes) {
            return Err(too_large);
        }
        let (Ok(rows), Ok(cols), Ok(len)) = (
            usize::try_from(declared_rows),
            usize::try_from(declared_cols),
            usize::try_from(bytes),
        ) else {
            return Err(too_large);
        };
        let mut pixels = vec![0_u8; len];
        fill(reader, &mut pixels, "image pixels")?;
        Ok(Self { rows, cols, pixels })
    }

    /// Writes the image with the same framing [`Image::read_from`] expects.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] when the socket fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        write_u64(writer, len_to_u64(self.rows))?;
        write_u64(writer, len_to_u64(self.cols))?;
        writer.write_all(&self.pixels)?;
        Ok(())
    }
}

/// Pixel bytes needed for a `rows x cols` image, if it fits in memory.
#[must_use]
pub fn byte_len(rows: usize, cols: usize) -> Option<usize> {
    rows.checked_mul(cols)?.checked_mul(CHANNELS)
}
