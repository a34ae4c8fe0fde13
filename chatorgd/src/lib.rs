//! Scope-aware harvesting and throttled bulk mutation of conversations and
//! projects behind a paginated, rate-limited REST API.

pub mod command;
pub mod config;
pub mod guard;
pub mod harvest;
pub mod model;
pub mod mutate;
pub mod pacing;
pub mod progress;
pub mod remote;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use command::Command;
pub use config::{ConfigError, EngineConfig};
pub use guard::{ConcurrentRunRejected, RunCategory, RunGuard};
pub use progress::{
    ChannelSink, CreatePhase, JsonLinesSink, NullSink, ProgressEvent, ProgressSink,
};
pub use remote::RemoteApi;
pub use service::{Reply, Service, ServiceError};
