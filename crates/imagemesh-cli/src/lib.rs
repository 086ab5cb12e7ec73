//! Command-line client for the imagemesh coordinator.
//!
//! The client reads image files, submits them to the coordinator as a single
//! request and writes each processed image next to the others in the output
//! directory. Failures are reported as short notices on stderr. When the
//! connection drops mid-request the client opens a fresh connection only to
//! confirm the server answers again, then closes it. The upload is never
//! resent automatically.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use imagemesh_config::SocketEndpoint;
use imagemesh_wire::{FrameLimits, OperationName, Request, Response};

mod cli;
mod errors;
mod images;
mod notice;
mod transport;

use cli::Cli;
use errors::{AppError, is_connection_lost};
use notice::Notice;
use socket2::Socket;
use transport::connect;

/// Runs the client using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(error, stdout, stderr),
    };

    match submit(&cli, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let notice = if is_connection_lost(&error) {
                check_reachable(&cli.server)
            } else {
                Notice::from_error(&error)
            };
            writeln!(stderr, "{notice}").ok();
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W: Write, E: Write>(error: clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    if error.use_stderr() {
        writeln!(stderr, "{}", AppError::CliUsage(error)).ok();
        ExitCode::FAILURE
    } else {
        write!(stdout, "{}", error.render()).ok();
        ExitCode::SUCCESS
    }
}

/// Checks the server accepts connections again after one dropped.
///
/// The test connection is closed straight away; nothing is resent on it.
fn check_reachable(server: &SocketEndpoint) -> Notice {
    match connect(server) {
        Ok(connection) => {
            drop(connection);
            Notice::Reachable(server.to_string())
        }
        Err(error) => Notice::from_error(&error),
    }
}

fn submit<W: Write>(cli: &Cli, stdout: &mut W) -> Result<(), AppError> {
    let images = cli
        .files
        .iter()
        .map(|path| images::load(path))
        .collect::<Result<Vec<_>, _>>()?;
    let operation =
        OperationName::new(cli.operation.as_str()).map_err(AppError::InvalidRequest)?;
    let request = Request::new(operation, images).map_err(AppError::InvalidRequest)?;

    let mut connection = connect(&cli.server)?;
    let processed = match exchange(&mut connection, &request)? {
        Response::Images(processed) => processed,
        Response::Rejected(message) => return Err(AppError::Rejected(message)),
        Response::Failed(message) => return Err(AppError::Failed(message)),
    };
    if processed.len() != cli.files.len() {
        return Err(AppError::ImageCount {
            expected: cli.files.len(),
            received: processed.len(),
        });
    }

    fs::create_dir_all(&cli.output_dir).map_err(|source| AppError::CreateOutputDir {
        path: cli.output_dir.clone(),
        source,
    })?;
    for (source, image) in cli.files.iter().zip(&processed) {
        let path = images::result_path(&cli.output_dir, source, &cli.operation);
        images::save(image, &path)?;
        writeln!(stdout, "{path}").map_err(AppError::Output)?;
    }
    Ok(())
}

fn exchange(connection: &mut Socket, request: &Request) -> Result<Response, AppError> {
    request
        .write_to(connection)
        .map_err(AppError::SendRequest)?;
    Response::read_from(connection, FrameLimits::unbounded()).map_err(AppError::ReadResponse)
}
