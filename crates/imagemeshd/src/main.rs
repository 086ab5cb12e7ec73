//! Coordinator entrypoint.
//!
//! Loads configuration, binds the client socket, checks the configured
//! workers and serves sessions until a termination signal arrives.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match imagemeshd::run_coordinator() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "imagemeshd::process", %error, "coordinator stopped");
            writeln!(io::stderr().lock(), "imagemeshd: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
