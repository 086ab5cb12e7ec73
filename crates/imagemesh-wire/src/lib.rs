//! Byte-level framing shared by the imagemesh client, coordinator and
//! workers.
//!
//! All integers are unsigned 64-bit big-endian. A client request is laid out
//! as:
//!
//! ```text
//! operation   32 bytes, UTF-8, NUL-padded
//! count       u64
//! repeated count times:
//!   rows      u64
//!   cols      u64
//!   pixels    rows * cols * 3 bytes, row-major, interleaved channels
//! ```
//!
//! Readers consume at most [`frame::READ_CHUNK_BYTES`] per socket read and
//! treat an early end of stream as a transport error rather than a
//! malformed request.

mod errors;
pub mod frame;
mod image;
mod operation;
mod request;
mod response;

pub use errors::WireError;
pub use image::{CHANNELS, Image, byte_len};
pub use operation::{OPERATION_FIELD_BYTES, OperationName};
pub use request::{FrameLimits, Request};
pub use response::{MAX_MESSAGE_BYTES, Response, ResponseStatus, clamp_message, read_message};
