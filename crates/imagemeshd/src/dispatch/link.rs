//! Point-to-point links from the coordinator to each worker identity.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use tracing::debug;

use imagemesh_config::{Config, SocketEndpoint};

use crate::cluster::{UnitReply, UnitRequest};
use crate::transport::ConnectionStream;

use super::{DISPATCH_TARGET, DispatchError};

/// A synchronous channel to one worker identity.
///
/// Implementations carry at most one outstanding unit: `round_trip` blocks
/// until the reply arrives or the link gives up.
pub(crate) trait WorkerLink: Send {
    /// Static identity of the worker, starting at 1.
    fn rank(&self) -> usize;

    /// Human-readable address for logs.
    fn endpoint(&self) -> String;

    /// Opens the underlying connection if it is not already open.
    fn ensure_connected(&mut self) -> Result<(), DispatchError>;

    /// Sends one unit and waits for its reply.
    fn round_trip(&mut self, request: &UnitRequest) -> Result<UnitReply, DispatchError>;

    /// Drops the connection so the next unit starts on a fresh one.
    fn reset(&mut self);
}

/// Builds links for configured worker endpoints.
pub(crate) trait WorkerConnector: Send + Sync {
    fn link(
        &self,
        rank: usize,
        endpoint: &SocketEndpoint,
        settings: LinkSettings,
    ) -> Box<dyn WorkerLink>;
}

/// Timeouts and limits shared by every link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkSettings {
    pub(crate) connect_timeout: Duration,
    pub(crate) round_trip_timeout: Duration,
    pub(crate) max_reply_bytes: u64,
}

impl LinkSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            round_trip_timeout: config.worker_timeout(),
            max_reply_bytes: config.max_image_bytes(),
        }
    }
}

/// Connector producing lazily connected socket links.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SocketWorkerConnector;

impl WorkerConnector for SocketWorkerConnector {
    fn link(
        &self,
        rank: usize,
        endpoint: &SocketEndpoint,
        settings: LinkSettings,
    ) -> Box<dyn WorkerLink> {
        Box::new(SocketWorkerLink::new(rank, endpoint.clone(), settings))
    }
}

/// Link over a TCP or Unix stream socket.
///
/// The connection opens on first use. Any failure drops it, so a reply that
/// arrives after a timeout is never read as the answer to a later unit.
#[derive(Debug)]
pub(crate) struct SocketWorkerLink {
    rank: usize,
    endpoint: SocketEndpoint,
    settings: LinkSettings,
    stream: Option<ConnectionStream>,
}

impl SocketWorkerLink {
    pub(crate) fn new(rank: usize, endpoint: SocketEndpoint, settings: LinkSettings) -> Self {
        Self {
            rank,
            endpoint,
            settings,
            stream: None,
        }
    }

    fn exchange(&mut self, request: &UnitRequest) -> Result<UnitReply, DispatchError> {
        self.ensure_connected()?;
        let (rank, timeout) = (self.rank, self.settings.round_trip_timeout);
        let max_reply_bytes = self.settings.max_reply_bytes;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DispatchError::internal("link lost its stream"))?;
        let mut bounded = Deadline {
            stream,
            until: Instant::now() + timeout,
        };
        request
            .write_to(&mut bounded)
            .map_err(|source| DispatchError::from_wire(rank, timeout, source))?;
        UnitReply::read_from(&mut bounded, max_reply_bytes)
            .map_err(|source| DispatchError::from_wire(rank, timeout, source))
    }
}

impl WorkerLink for SocketWorkerLink {
    fn rank(&self) -> usize {
        self.rank
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    fn ensure_connected(&mut self) -> Result<(), DispatchError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = connect_endpoint(&self.endpoint, self.settings.connect_timeout)
            .map_err(|source| DispatchError::Connect {
                rank: self.rank,
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        debug!(
            target: DISPATCH_TARGET,
            rank = self.rank,
            endpoint = %self.endpoint,
            "worker link opened"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn round_trip(&mut self, request: &UnitRequest) -> Result<UnitReply, DispatchError> {
        let result = self.exchange(request);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn reset(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
            debug!(
                target: DISPATCH_TARGET,
                rank = self.rank,
                "worker link dropped"
            );
        }
    }
}

fn connect_endpoint(endpoint: &SocketEndpoint, timeout: Duration) -> io::Result<ConnectionStream> {
    let socket = endpoint.connect(timeout)?;
    match endpoint {
        SocketEndpoint::Tcp { .. } => Ok(ConnectionStream::Tcp(socket.into())),
        #[cfg(unix)]
        SocketEndpoint::Unix { .. } => Ok(ConnectionStream::Unix(socket.into())),
        #[cfg(not(unix))]
        SocketEndpoint::Unix { .. } => Err(io::Error::from(io::ErrorKind::Unsupported)),
    }
}

/// Stream view that fails once `until` has passed.
///
/// Each read and write may only wait for what is left of the round trip, so a
/// worker trickling bytes cannot stretch an exchange past its budget.
struct Deadline<'a> {
    stream: &'a mut ConnectionStream,
    until: Instant,
}

impl Deadline<'_> {
    fn arm(&self) -> io::Result<()> {
        let remaining = self.until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "round trip deadline passed",
            ));
        }
        self.stream.set_timeouts(Some(remaining))
    }
}

impl Read for Deadline<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.read(buf)
    }
}

impl Write for Deadline<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm()?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use rstest::{fixture, rstest};

    use imagemesh_config::UnitCodec;
    use imagemesh_wire::OperationName;

    use super::*;
    use crate::cluster::UnitBody;

    #[fixture]
    fn settings() -> LinkSettings {
        LinkSettings {
            connect_timeout: Duration::from_millis(500),
            round_trip_timeout: Duration::from_millis(200),
            max_reply_bytes: 1024,
        }
    }

    fn request(ticket: u64) -> UnitRequest {
        UnitRequest {
            ticket,
            operation: OperationName::new("sharpen").expect("operation"),
            codec: UnitCodec::Png,
            quality: 95,
            payload: vec![1, 2, 3],
        }
    }

    fn loopback() -> (TcpListener, SocketEndpoint) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind worker");
        let port = listener.local_addr().expect("local address").port();
        (listener, SocketEndpoint::tcp("127.0.0.1", port))
    }

    #[rstest]
    fn round_trip_reuses_one_connection(settings: LinkSettings) {
        let (listener, endpoint) = loopback();
        let worker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept coordinator");
            for _ in 0..2 {
                let unit = UnitRequest::read_from(&mut stream, 1024).expect("read unit");
                let reply = UnitReply {
                    ticket: unit.ticket,
                    body: UnitBody::PassThrough {
                        codec: unit.codec,
                        payload: unit.payload,
                    },
                };
                reply.write_to(&mut stream).expect("write reply");
            }
        });

        let mut link = SocketWorkerLink::new(1, endpoint, settings);
        for ticket in [10, 11] {
            let reply = link.round_trip(&request(ticket)).expect("round trip");
            assert_eq!(reply.ticket, ticket);
        }
        worker.join().expect("join worker");
    }

    #[rstest]
    fn silent_worker_times_out_and_drops_the_stream(settings: LinkSettings) {
        let (listener, endpoint) = loopback();
        let worker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept coordinator");
            let _unit = UnitRequest::read_from(&mut stream, 1024).expect("read unit");
            thread::sleep(Duration::from_millis(400));
            drop(stream.flush());
        });

        let mut link = SocketWorkerLink::new(3, endpoint, settings);
        let error = link.round_trip(&request(1)).expect_err("no reply");
        assert!(matches!(error, DispatchError::Timeout { rank: 3, .. }));
        assert!(link.stream.is_none());
        worker.join().expect("join worker");
    }

    #[rstest]
    fn trickling_worker_cannot_outlast_the_round_trip_budget(settings: LinkSettings) {
        let (listener, endpoint) = loopback();
        let worker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept coordinator");
            let unit = UnitRequest::read_from(&mut stream, 1024).expect("read unit");
            let mut reply = Vec::new();
            UnitReply::failed(unit.ticket, "slow")
                .write_to(&mut reply)
                .expect("encode reply");
            for byte in reply {
                thread::sleep(Duration::from_millis(60));
                if stream.write_all(&[byte]).is_err() {
                    break;
                }
            }
        });

        let mut link = SocketWorkerLink::new(4, endpoint, settings);
        let started = Instant::now();
        let error = link.round_trip(&request(2)).expect_err("reply too slow");
        assert!(matches!(error, DispatchError::Timeout { rank: 4, .. }));
        assert!(
            started.elapsed() < Duration::from_millis(600),
            "deadline should bound the whole exchange, took {:?}",
            started.elapsed()
        );
        assert!(link.stream.is_none());
        worker.join().expect("join worker");
    }

    #[cfg(unix)]
    #[rstest]
    fn missing_unix_worker_reports_connect_error(settings: LinkSettings) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.sock");
        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path").to_owned());
        let mut link = SocketWorkerLink::new(5, endpoint, settings);
        let error = link.ensure_connected().expect_err("no socket file");
        assert!(matches!(error, DispatchError::Connect { rank: 5, .. }));
    }

    #[rstest]
    fn unreachable_worker_reports_connect_error(settings: LinkSettings) {
        let (listener, endpoint) = loopback();
        drop(listener);
        let mut link = SocketWorkerLink::new(2, endpoint, settings);
        let error = link.ensure_connected().expect_err("nobody listening");
        assert!(matches!(error, DispatchError::Connect { rank: 2, .. }));
    }
}
