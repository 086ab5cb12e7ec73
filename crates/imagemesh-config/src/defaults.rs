//! Default values for every configuration field.

use crate::codec::UnitCodec;
use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Port the coordinator listens on for client requests.
pub const DEFAULT_LISTEN_PORT: u16 = 12345;

/// Port a worker listens on for its coordinator.
pub const DEFAULT_WORKER_PORT: u16 = 12346;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Bound on a single coordinator-to-worker round trip.
pub const DEFAULT_WORKER_TIMEOUT_MS: u64 = 30_000;

/// Bound on establishing a worker link.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// JPEG quality used for unit payloads.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Upper bound on the number of images in one request.
pub const DEFAULT_MAX_IMAGES: u64 = 64;

/// Upper bound on the raw pixel bytes of one image or unit payload.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 256 * 1024 * 1024;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default client-facing endpoint of the coordinator.
#[must_use]
pub fn default_listen_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("0.0.0.0", DEFAULT_LISTEN_PORT)
}

/// Default endpoint a worker binds for its coordinator link.
#[must_use]
pub fn default_worker_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_WORKER_PORT)
}

/// Default intra-cluster codec.
#[must_use]
pub const fn default_unit_codec() -> UnitCodec {
    UnitCodec::Jpeg
}
