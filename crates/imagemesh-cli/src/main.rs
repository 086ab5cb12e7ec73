//! CLI entrypoint for the imagemesh client.
//!
//! Delegates to [`imagemesh_cli::run`], which parses arguments, submits the
//! images to the coordinator and writes the processed results.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    imagemesh_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
