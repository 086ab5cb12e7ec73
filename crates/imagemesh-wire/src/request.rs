//! Client request framing.

use std::io::{Read, Write};

use crate::frame::{len_to_u64, read_u64, write_u64};
use crate::{Image, OperationName, WireError};

/// Bounds applied while decoding a request.
///
/// Limits are checked against headers before any pixel memory is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest accepted image count.
    pub max_images: u64,
    /// Largest accepted pixel payload for one image.
    pub max_image_bytes: u64,
}

impl FrameLimits {
    /// Limits that accept anything the framing can express.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_images: u64::MAX,
            max_image_bytes: u64::MAX,
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// One client request: an operation and the images it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    operation: OperationName,
    images: Vec<Image>,
}

impl Request {
    /// Builds a request.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::NoImages`] for an empty image list.
    pub fn new(operation: OperationName, images: Vec<Image>) -> Result<Self, WireError> {
        if images.is_empty() {
            return Err(WireError::NoImages);
        }
        Ok(Self { operation, images })
    }

    /// Transform the client asked for.
    #[must_use]
    pub const fn operation(&self) -> &OperationName {
        &self.operation
    }

    /// Images in submission order.
    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Splits the request into its parts.
    #[must_use]
    pub fn into_parts(self) -> (OperationName, Vec<Image>) {
        (self.operation, self.images)
    }

    /// Reads a complete request.
    ///
    /// # Errors
    ///
    /// Returns decode errors for malformed or over-limit frames and transport
    /// errors when the client disconnects part way.
    pub fn read_from<R: Read>(reader: &mut R, limits: FrameLimits) -> Result<Self, WireError> {
        let operation = OperationName::read_from(reader)?;
        let count = read_u64(reader, "image count")?;
        if count == 0 {
            return Err(WireError::NoImages);
        }
        let images = read_images(reader, count, limits)?;
        Ok(Self { operation, images })
    }

    /// Writes the request.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] when the socket fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        self.operation.write_to(writer)?;
        write_u64(writer, len_to_u64(self.images.len()))?;
        for image in &self.images {
            image.write_to(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Reads `count` framed images after checking the count against `limits`.
pub(crate) fn read_images<R: Read>(
    reader: &mut R,
    count: u64,
    limits: FrameLimits,
) -> Result<Vec<Image>, WireError> {
    let too_many = || WireError::TooManyImages {
        count,
        max: limits.max_images,
    };
    if count > limits.max_images {
        return Err(too_many());
    }
    let total = usize::try_from(count).map_err(|_| too_many())?;
    let mut images = Vec::with_capacity(total.min(1024));
    for index in 0..total {
        images.push(Image::read_from(reader, index, limits.max_image_bytes)?);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::OPERATION_FIELD_BYTES;

    #[fixture]
    fn operation() -> OperationName {
        OperationName::new("color_inversion").expect("valid operation")
    }

    fn solid(rows: usize, cols: usize, value: u8) -> Image {
        Image::new(rows, cols, vec![value; rows * cols * 3]).expect("valid image")
    }

    #[rstest]
    fn request_layout_matches_protocol(operation: OperationName) {
        let request = Request::new(operation, vec![solid(1, 2, 9)]).expect("request");
        let mut encoded = Vec::new();
        request.write_to(&mut encoded).expect("encode");

        assert_eq!(&encoded[..15], b"color_inversion");
        let count_at = OPERATION_FIELD_BYTES;
        assert_eq!(&encoded[count_at..count_at + 8], &1_u64.to_be_bytes());
        assert_eq!(encoded.len(), OPERATION_FIELD_BYTES + 8 + 16 + 6);

        let decoded = Request::read_from(&mut Cursor::new(encoded), FrameLimits::default())
            .expect("decode");
        assert_eq!(decoded, request);
    }

    #[rstest]
    fn zero_images_are_rejected(operation: OperationName) {
        let mut encoded = Vec::new();
        operation.write_to(&mut encoded).expect("operation");
        write_u64(&mut encoded, 0).expect("count");
        let error = Request::read_from(&mut Cursor::new(encoded), FrameLimits::default())
            .expect_err("no images");
        assert!(matches!(error, WireError::NoImages));
    }

    #[rstest]
    fn image_count_limit_applies_before_reading_images(operation: OperationName) {
        let mut encoded = Vec::new();
        operation.write_to(&mut encoded).expect("operation");
        write_u64(&mut encoded, 5).expect("count");
        let limits = FrameLimits {
            max_images: 4,
            ..FrameLimits::default()
        };
        let error = Request::read_from(&mut Cursor::new(encoded), limits).expect_err("limit");
        assert!(matches!(error, WireError::TooManyImages { count: 5, max: 4 }));
    }

    #[rstest]
    fn disconnect_mid_request_is_transport(operation: OperationName) {
        let request =
            Request::new(operation, vec![solid(2, 2, 1), solid(3, 3, 2)]).expect("request");
        let mut encoded = Vec::new();
        request.write_to(&mut encoded).expect("encode");
        encoded.truncate(encoded.len() - 5);
        let error = Request::read_from(&mut Cursor::new(encoded), FrameLimits::default())
            .expect_err("truncated");
        assert!(error.is_transport());
    }

    #[rstest]
    fn empty_request_cannot_be_built(operation: OperationName) {
        assert!(matches!(Request::new(operation, Vec::new()), Err(WireError::NoImages)));
    }
}
