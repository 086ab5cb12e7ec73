//! Test harness utilities shared by the behavioural suites.

mod config_loader;
mod reporter;
mod workers;
mod world;

pub use config_loader::FailingConfigLoader;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use workers::LoopbackWorker;
pub use world::{TestWorld, world};
