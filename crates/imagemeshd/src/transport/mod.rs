//! Socket listener shared by the coordinator and worker processes.
//!
//! The transport binds configured endpoints and accepts connections on a
//! background thread. Coordinator sessions each get their own thread; a
//! worker serves its connections one at a time.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{ListenerHandle, ServeMode, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
