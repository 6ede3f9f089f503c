pub mod cli;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod info;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod resp;
pub mod snapshot;
pub mod store;

pub use endpoint::Endpoint;
pub use error::{Error, FatalReason, Result};
pub use monitor::PollingEngine;
pub use snapshot::{
    ClusterReport, HealthStatus, NodeRole, NodeSnapshot, PollResult, SentinelSnapshot,
};
pub use store::{Page, SnapshotStore};
