//! Coordinator-to-worker unit protocol.
//!
//! Each work unit travels as one [`UnitRequest`] frame and is answered by
//! exactly one [`UnitReply`] carrying the same ticket. Pixel payloads are
//! compressed with the configured [`UnitCodec`](imagemesh_config::UnitCodec)
//! before they leave the coordinator.
//!
//! ```text
//! request: ticket u64 | operation [32] | codec u8 | quality u8 | len u64 | payload
//! reply:   ticket u64 | status u8 | (codec u8 | len u64 | payload) or (len u64 | message)
//! ```

mod codec;
mod frame;

pub use self::codec::CodecError;
pub(crate) use self::codec::{
    UnitEncoding, decode_dynamic, decode_payload, encode_dynamic, encode_image,
};
pub(crate) use self::frame::{UnitBody, UnitReply, UnitRequest};
