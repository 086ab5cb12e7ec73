//! Worker entrypoint: serves work units from the coordinator.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match imagemeshd::run_worker() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "imagemeshd::process", %error, "worker stopped");
            writeln!(io::stderr().lock(), "imagemesh-worker: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
