//! Error types and diagnostics helpers for the client runtime.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use imagemesh_wire::WireError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("file not found: {path}")]
    FileNotFound { path: Utf8PathBuf },
    #[error("failed to read image {path}: {source}")]
    LoadImage {
        path: Utf8PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} is too large to submit")]
    ImageTooLarge { path: Utf8PathBuf },
    #[error("invalid request: {0}")]
    InvalidRequest(WireError),
    #[error("failed to connect to server at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[error("failed to send request: {0}")]
    SendRequest(WireError),
    #[error("failed to read response: {0}")]
    ReadResponse(WireError),
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error("server failed to process the request: {0}")]
    Failed(String),
    #[error("server returned {received} images for {expected} submitted")]
    ImageCount { expected: usize, received: usize },
    #[error("failed to create output directory {path}: {source}")]
    CreateOutputDir { path: Utf8PathBuf, source: io::Error },
    #[error("failed to write result {path}: {source}")]
    WriteResult {
        path: Utf8PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write output: {0}")]
    Output(io::Error),
}

/// Determines whether an error means the server connection dropped under
/// us, in which case the client checks the server is back and asks the user
/// to retry.
pub(crate) fn is_connection_lost(error: &AppError) -> bool {
    match error {
        AppError::SendRequest(WireError::Io(source))
        | AppError::ReadResponse(WireError::Io(source)) => matches!(
            source.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}
