//! Shared configuration for the imagemesh coordinator and worker binaries.
//!
//! Both binaries resolve their settings through `ortho_config`, layering
//! built-in defaults, an optional TOML file (`--config-path` or the
//! `*_CONFIG_PATH` variable), environment variables and command-line flags, in
//! increasing order of precedence.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod codec;
mod defaults;
mod logging;
mod socket;
mod workers;

pub use codec::{UnitCodec, UnitCodecParseError};
pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_JPEG_QUALITY, DEFAULT_LISTEN_PORT, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_IMAGES, DEFAULT_WORKER_PORT, DEFAULT_WORKER_TIMEOUT_MS,
    default_listen_endpoint, default_log_filter, default_log_filter_string, default_log_format,
    default_unit_codec, default_worker_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};
pub use workers::{WorkerEndpoints, WorkerEndpointsError};

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "IMAGEMESH")]
pub struct Config {
    /// Endpoint accepting client requests.
    #[ortho_config(default = default_listen_endpoint())]
    pub listen: SocketEndpoint,
    /// Worker endpoints in rank order (rank `1` first).
    #[ortho_config(default = WorkerEndpoints::default())]
    pub workers: WorkerEndpoints,
    /// Milliseconds to wait for one worker round trip.
    #[ortho_config(default = DEFAULT_WORKER_TIMEOUT_MS)]
    pub worker_timeout_ms: u64,
    /// Milliseconds to wait while opening a worker link.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Compressed format for unit payloads.
    #[ortho_config(default = default_unit_codec())]
    pub unit_codec: UnitCodec,
    /// JPEG quality (1-100) when `unit_codec` is `jpeg`.
    #[ortho_config(default = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,
    /// Maximum images accepted in one request.
    #[ortho_config(default = DEFAULT_MAX_IMAGES)]
    pub max_images: u64,
    /// Maximum raw pixel bytes accepted per image.
    #[ortho_config(default = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: u64,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            workers: WorkerEndpoints::default(),
            worker_timeout_ms: DEFAULT_WORKER_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            unit_codec: default_unit_codec(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_images: DEFAULT_MAX_IMAGES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint accepting client requests.
    #[must_use]
    pub const fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Worker endpoints in rank order.
    #[must_use]
    pub const fn workers(&self) -> &WorkerEndpoints {
        &self.workers
    }

    /// Bound on one worker round trip.
    #[must_use]
    pub const fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    /// Bound on opening a worker link.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Codec applied to unit payloads.
    #[must_use]
    pub const fn unit_codec(&self) -> UnitCodec {
        self.unit_codec
    }

    /// JPEG quality clamped to the encoder's accepted range.
    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }

    /// Maximum images per request.
    #[must_use]
    pub const fn max_images(&self) -> u64 {
        self.max_images
    }

    /// Maximum raw pixel bytes per image.
    #[must_use]
    pub const fn max_image_bytes(&self) -> u64 {
        self.max_image_bytes
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Worker process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "IMAGEMESH_WORKER")]
pub struct WorkerConfig {
    /// Endpoint accepting the coordinator link.
    #[ortho_config(default = default_worker_endpoint())]
    pub listen: SocketEndpoint,
    /// Maximum encoded unit payload accepted from the coordinator.
    #[ortho_config(default = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_unit_bytes: u64,
    /// Tracing filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen: default_worker_endpoint(),
            max_unit_bytes: DEFAULT_MAX_IMAGE_BYTES,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl WorkerConfig {
    /// Endpoint accepting the coordinator link.
    #[must_use]
    pub const fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Maximum encoded unit payload.
    #[must_use]
    pub const fn max_unit_bytes(&self) -> u64 {
        self.max_unit_bytes
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
