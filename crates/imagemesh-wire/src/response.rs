//! Server response framing.
//!
//! A response starts with one status byte. Success carries the processed
//! images framed like a request body; the other statuses carry a
//! length-prefixed UTF-8 message.

use std::io::{Read, Write};

use crate::frame::{len_to_u64, read_prefixed, read_u8, read_u64, write_prefixed, write_u64};
use crate::request::read_images;
use crate::{FrameLimits, Image, WireError};

/// Longest status message either side will send or accept.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// First byte of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Processing succeeded; images follow.
    Ok,
    /// The request was malformed or violated a limit.
    Rejected,
    /// The request was valid but processing failed.
    Failed,
}

impl ResponseStatus {
    /// Byte written for this status.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Rejected => 1,
            Self::Failed => 2,
        }
    }

    /// Decodes a status byte.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownStatus`] for unassigned values.
    pub const fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Rejected),
            2 => Ok(Self::Failed),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// Outcome of one client request as sent back on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Processed images in request order.
    Images(Vec<Image>),
    /// The request could not be decoded or exceeded a limit.
    Rejected(String),
    /// Processing failed after the request was accepted.
    Failed(String),
}

impl Response {
    /// Builds a rejection, truncating the message to fit the frame.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(clamp_message(message.into()))
    }

    /// Builds a failure, truncating the message to fit the frame.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(clamp_message(message.into()))
    }

    /// Status byte matching the variant.
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        match self {
            Self::Images(_) => ResponseStatus::Ok,
            Self::Rejected(_) => ResponseStatus::Rejected,
            Self::Failed(_) => ResponseStatus::Failed,
        }
    }

    /// Writes the response and flushes the stream.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] when the socket fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), WireError> {
        writer.write_all(&[self.status().tag()])?;
        match self {
            Self::Images(images) => {
                write_u64(writer, len_to_u64(images.len()))?;
                for image in images {
                    image.write_to(writer)?;
                }
            }
            Self::Rejected(message) | Self::Failed(message) => {
                let bounded = clamp_message(message.clone());
                write_prefixed(writer, bounded.as_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a response.
    ///
    /// # Errors
    ///
    /// Returns transport errors when the server disconnects and decode
    /// errors for malformed frames.
    pub fn read_from<R: Read>(reader: &mut R, limits: FrameLimits) -> Result<Self, WireError> {
        let status = ResponseStatus::from_tag(read_u8(reader, "response status")?)?;
        match status {
            ResponseStatus::Ok => {
                let count = read_u64(reader, "image count")?;
                Ok(Self::Images(read_images(reader, count, limits)?))
            }
            ResponseStatus::Rejected => Ok(Self::Rejected(read_message(reader)?)),
            ResponseStatus::Failed => Ok(Self::Failed(read_message(reader)?)),
        }
    }
}

/// Reads a bounded UTF-8 message.
///
/// # Errors
///
/// Returns [`WireError::InvalidMessage`] when the text is too long or not
/// UTF-8.
pub fn read_message<R: Read>(reader: &mut R) -> Result<String, WireError> {
    let bytes = read_prefixed(reader, len_to_u64(MAX_MESSAGE_BYTES), "message", |len| {
        WireError::invalid_message(format!("{len} bytes exceeds {MAX_MESSAGE_BYTES}"))
    })?;
    String::from_utf8(bytes).map_err(|error| WireError::invalid_message(error.to_string()))
}

/// Truncates `message` to at most [`MAX_MESSAGE_BYTES`] on a char boundary.
#[must_use]
pub fn clamp_message(mut message: String) -> String {
    if message.len() <= MAX_MESSAGE_BYTES {
        return message;
    }
    let cut = (0..=MAX_MESSAGE_BYTES)
        .rev()
        .find(|index| message.is_char_boundary(*index))
        .unwrap_or(0);
    message.truncate(cut);
    message
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;

    fn decode(bytes: Vec<u8>) -> Result<Response, WireError> {
        Response::read_from(&mut Cursor::new(bytes), FrameLimits::default())
    }

    #[rstest]
    #[case(Response::rejected("unsupported image shape"), 1)]
    #[case(Response::failed("worker 2 timed out"), 2)]
    fn error_responses_carry_their_message(#[case] response: Response, #[case] tag: u8) {
        let mut encoded = Vec::new();
        response.write_to(&mut encoded).expect("encode");
        assert_eq!(encoded[0], tag);
        assert_eq!(decode(encoded).expect("decode"), response);
    }

    #[test]
    fn success_response_carries_images_in_order() {
        let first = Image::new(1, 1, vec![1, 2, 3]).expect("first");
        let second = Image::new(2, 1, vec![4, 5, 6, 7, 8, 9]).expect("second");
        let response = Response::Images(vec![first, second]);
        let mut encoded = Vec::new();
        response.write_to(&mut encoded).expect("encode");
        assert_eq!(encoded[0], 0);
        assert_eq!(decode(encoded).expect("decode"), response);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(decode(vec![7]), Err(WireError::UnknownStatus(7))));
    }

    #[test]
    fn oversized_messages_are_clamped_on_char_boundaries() {
        let message = "é".repeat(MAX_MESSAGE_BYTES);
        let clamped = clamp_message(message);
        assert!(clamped.len() <= MAX_MESSAGE_BYTES);
        assert!(clamped.chars().all(|c| c == 'é'));
    }

    #[test]
    fn message_length_prefix_is_bounded() {
        let mut encoded = vec![ResponseStatus::Failed.tag()];
        write_u64(&mut encoded, u64::MAX).expect("length");
        assert!(matches!(decode(encoded), Err(WireError::InvalidMessage(_))));
    }
}
