//! Error types for frame encoding and decoding.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading or writing protocol frames.
///
/// Variants split into transport failures (the peer went away or the socket
/// broke) and decode failures (the bytes arrived but describe an invalid
/// request). [`WireError::is_transport`] tells them apart.
#[derive(Debug, Error)]
pub enum WireError {
    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the stream before a field was complete.
    #[error("connection closed while reading {field}: received {received} of {expected} bytes")]
    Truncated {
        /// Field being read when the stream ended.
        field: &'static str,
        /// Bytes the field needs.
        expected: usize,
        /// Bytes that arrived.
        received: usize,
    },

    /// The operation name does not fit the fixed-width field.
    #[error("operation name is {length} bytes; the field holds at most {max}")]
    OperationTooLong {
        /// Encoded length of the name.
        length: usize,
        /// Field width.
        max: usize,
    },

    /// The operation field was blank.
    #[error("operation name is empty")]
    EmptyOperation,

    /// The operation field held bytes that are not UTF-8 or embed a NUL.
    #[error("operation name is not valid text")]
    InvalidOperation,

    /// A request announced zero images.
    #[error("request contains no images")]
    NoImages,

    /// A request announced more images than the server accepts.
    #[error("request announces {count} images; at most {max} are accepted")]
    TooManyImages {
        /// Announced image count.
        count: u64,
        /// Configured limit.
        max: u64,
    },

    /// An image header declared a zero dimension.
    #[error("image {index} has an empty shape ({rows}x{cols})")]
    EmptyImage {
        /// Position of the image in the request.
        index: usize,
        /// Declared rows.
        rows: u64,
        /// Declared columns.
        cols: u64,
    },

    /// An image header declared more pixel bytes than allowed.
    #[error("image {index} needs {bytes} bytes; at most {max} are accepted")]
    ImageTooLarge {
        /// Position of the image in the request.
        index: usize,
        /// Pixel bytes implied by the header.
        bytes: u128,
        /// Configured limit.
        max: u64,
    },

    /// A pixel buffer does not match its declared shape.
    #[error("pixel buffer holds {actual} bytes but a {rows}x{cols} image needs {expected}")]
    ShapeMismatch {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        cols: usize,
        /// Bytes the shape needs.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// A response began with an unknown status byte.
    #[error("unknown response status {0}")]
    UnknownStatus(u8),

    /// A unit frame named a payload codec this build does not know.
    #[error("unknown payload codec {0}")]
    UnknownCodec(u8),

    /// A length-prefixed payload exceeded the receiver's limit.
    #[error("payload of {bytes} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Announced payload length.
        bytes: u64,
        /// Receiver limit.
        max: u64,
    },

    /// A status message was too long or not UTF-8.
    #[error("invalid status message: {0}")]
    InvalidMessage(String),
}

impl WireError {
    /// Returns `true` when the failure came from the connection rather than
    /// from the content of the frame.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Truncated { .. })
    }

    /// Creates an invalid message error.
    #[must_use]
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage(message.into())
    }
}
