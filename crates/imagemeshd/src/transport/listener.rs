//! Accept loop for coordinator and worker sockets.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use socket2::{Socket, Type};
use tracing::{info, warn};

use imagemesh_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;

const IDLE_POLL: Duration = Duration::from_millis(25);
const ERROR_POLL: Duration = Duration::from_millis(150);
const BACKLOG: i32 = 128;

/// How accepted connections reach the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServeMode {
    /// Every connection runs on its own thread. Coordinator sessions use this.
    PerConnection,
    /// Connections queue for one serving thread and run one after another,
    /// so a worker never has two units in progress.
    Serial,
}

/// Socket bound to an endpoint and listening, not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: Socket,
}

impl SocketListener {
    /// Binds `endpoint` in non-blocking mode.
    ///
    /// A Unix socket file left behind by a process that no longer answers is
    /// replaced.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let address = endpoint
            .socket_address()
            .map_err(|source| ListenerError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?;
        #[cfg(unix)]
        if let Some(path) = endpoint.unix_path() {
            clear_stale_socket(endpoint, path.as_std_path())?;
        }
        let failed = |source| ListenerError::Bind {
            endpoint: endpoint.clone(),
            source,
        };
        let socket = Socket::new(address.domain(), Type::STREAM, None).map_err(failed)?;
        if endpoint.unix_path().is_none() {
            socket.set_reuse_address(true).map_err(failed)?;
        }
        socket
            .bind(&address)
            .and_then(|()| socket.listen(BACKLOG))
            .and_then(|()| socket.set_nonblocking(true))
            .map_err(failed)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.socket
            .local_addr()
            .ok()
            .and_then(|address| address.as_socket())
    }

    /// Starts accepting on a background thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        mode: ServeMode,
    ) -> ListenerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let endpoint = self.endpoint.clone();
        let thread = thread::spawn(move || match mode {
            ServeMode::PerConnection => self.accept_until(&flag, |stream| {
                let session = Arc::clone(&handler);
                thread::spawn(move || session.handle(stream));
            }),
            ServeMode::Serial => {
                let (queue, pending) = mpsc::channel::<ConnectionStream>();
                let _serving = thread::spawn(move || {
                    for stream in pending {
                        handler.handle(stream);
                    }
                });
                self.accept_until(&flag, |stream| {
                    if queue.send(stream).is_err() {
                        warn!(
                            target: LISTENER_TARGET,
                            endpoint = %self.endpoint,
                            "serving thread has stopped; connection dropped"
                        );
                    }
                });
            }
        });
        ListenerHandle {
            endpoint,
            stop,
            thread: Some(thread),
        }
    }

    fn accept_until(&self, stop: &AtomicBool, mut deliver: impl FnMut(ConnectionStream)) {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "accepting connections"
        );
        let mut reported = None::<io::ErrorKind>;
        while !stop.load(Ordering::SeqCst) {
            match self.accept() {
                Ok(Some(stream)) => {
                    reported = None;
                    deliver(stream);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    if reported != Some(error.kind()) {
                        warn!(
                            target: LISTENER_TARGET,
                            endpoint = %self.endpoint,
                            %error,
                            "accept failed"
                        );
                    }
                    reported = Some(error.kind());
                    thread::sleep(ERROR_POLL);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "stopped accepting"
        );
        #[cfg(unix)]
        remove_socket_file(&self.endpoint);
    }

    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self.socket.accept() {
            Ok((accepted, _)) => accepted,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(error) => return Err(error),
        };
        accepted.set_nonblocking(false)?;
        match &self.endpoint {
            SocketEndpoint::Tcp { .. } => {
                accepted.set_nodelay(true)?;
                Ok(Some(ConnectionStream::Tcp(accepted.into())))
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { .. } => Ok(Some(ConnectionStream::Unix(accepted.into()))),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }
}

/// Handle to a running accept loop.
///
/// Dropping the handle stops the loop without waiting for it.
pub(crate) struct ListenerHandle {
    endpoint: SocketEndpoint,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop after its current poll.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to finish.
    ///
    /// Connections already handed to a handler keep running.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread
            .join()
            .map_err(|_| ListenerError::AcceptPanicked {
                endpoint: self.endpoint.clone(),
            })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clears a socket file whose owner is gone.
#[cfg(unix)]
fn clear_stale_socket(endpoint: &SocketEndpoint, path: &Path) -> Result<(), ListenerError> {
    let failed = |source| ListenerError::Bind {
        endpoint: endpoint.clone(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(failed(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            endpoint: endpoint.clone(),
        });
    }
    if UnixStream::connect(path).is_ok() {
        return Err(ListenerError::InUse {
            endpoint: endpoint.clone(),
        });
    }
    fs::remove_file(path).map_err(failed)
}

#[cfg(unix)]
fn remove_socket_file(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            %error,
            %path,
            "failed to remove unix socket file"
        );
    }
}
