//! CLI argument definitions for the imagemesh client.

use camino::Utf8PathBuf;
use clap::Parser;

use imagemesh_config::SocketEndpoint;

/// Submits images to an imagemesh coordinator and saves the results.
#[derive(Parser, Debug)]
#[command(name = "imagemesh")]
pub(crate) struct Cli {
    /// Coordinator endpoint, `tcp://host:port` or `unix:///path`.
    #[arg(long, default_value = "tcp://127.0.0.1:12345")]
    pub(crate) server: SocketEndpoint,
    /// Transform to apply, for example `gaussian_blur`.
    #[arg(long)]
    pub(crate) operation: String,
    /// Directory receiving `<stem>.<operation>.png` results.
    #[arg(long, default_value = ".")]
    pub(crate) output_dir: Utf8PathBuf,
    /// Image files to submit, in order.
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    pub(crate) files: Vec<Utf8PathBuf>,
}
