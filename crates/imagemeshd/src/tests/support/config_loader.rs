//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use imagemesh_config::{Config, SocketEndpoint, UnitCodec, WorkerEndpoints};

use crate::bootstrap::ConfigLoader;

/// Loader that places the client socket under a temporary directory.
pub struct TestConfigLoader {
    socket_dir: TempDir,
    workers: Vec<SocketEndpoint>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new(workers: Vec<SocketEndpoint>) -> Self {
        let socket_dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            socket_dir,
            workers,
        }
    }

    fn socket_path(&self) -> String {
        let path = self.socket_dir.path().join("nested").join("imagemeshd.sock");
        path.to_str()
            .expect("temporary socket path was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader<Config> for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen: SocketEndpoint::unix(self.socket_path()),
            workers: WorkerEndpoints::new(self.workers.clone()),
            worker_timeout_ms: 2_000,
            connect_timeout_ms: 500,
            unit_codec: UnitCodec::Png,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid listen endpoint.
pub struct FailingConfigLoader;

impl ConfigLoader<Config> for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("imagemeshd"),
            OsString::from("--listen"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
