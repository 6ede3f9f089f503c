//! Snapshot and report types produced by a polling cycle.

use chrono::Local;

use crate::endpoint::Endpoint;
use crate::error::FatalReason;

/// Role of a data node within its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Master,
    Replica,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Master => "master",
            NodeRole::Replica => "replica",
        }
    }

    /// Lenient mapping for role strings read back from history.
    pub fn from_db(s: &str) -> Self {
        match s {
            "master" | "Master" => NodeRole::Master,
            _ => NodeRole::Replica,
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health classification of one observation.
///
/// `DownOrError` covers both an unreachable node and a node whose probe
/// failed mid-conversation; the two are indistinguishable to a caller
/// and are treated the same. `DiscoveryError` marks a cluster whose
/// replica enumeration failed, not a probed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    DownOrError,
    DiscoveryError,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Unhealthy => "Unhealthy",
            HealthStatus::DownOrError => "Down/Error",
            HealthStatus::DiscoveryError => "Discovery Error",
        }
    }

    /// Lenient mapping for health strings read back from history.
    /// Unknown strings from older databases degrade to `Down/Error`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "Healthy" => HealthStatus::Healthy,
            "Unhealthy" => HealthStatus::Unhealthy,
            "Discovery Error" => HealthStatus::DiscoveryError,
            _ => HealthStatus::DownOrError,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of one data node.
///
/// Measurements are `None` when the probe could not obtain them; absence
/// is preserved all the way into storage as SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub timestamp: String,
    pub cluster: String,
    pub role: NodeRole,
    pub endpoint: Endpoint,
    pub health: HealthStatus,
    pub keys: Option<u64>,
    pub clients: Option<u32>,
    pub memory: Option<String>,
    /// The master this node belongs under; for the master itself, its
    /// own endpoint.
    pub master: Endpoint,
}

/// One observation of one Sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelSnapshot {
    pub timestamp: String,
    pub endpoint: Endpoint,
    pub status: HealthStatus,
    pub masters_monitored: u32,
    pub is_tilt: bool,
    pub running_scripts: u32,
}

/// Everything observed about one master and its replicas in a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    pub cluster: String,
    pub master: Endpoint,
    pub master_status: HealthStatus,
    pub replica_count: usize,
    pub master_keys: Option<u64>,
    pub master_memory: Option<String>,
    /// Master first, then replicas in Sentinel's enumeration order.
    /// Empty when replica discovery failed for this cluster.
    pub nodes: Vec<NodeSnapshot>,
}

/// Outcome of one polling cycle.
///
/// `fatal` is set only when no configured Sentinel answered or the
/// master enumeration call failed; in that case `clusters` and
/// `sentinels` are empty and nothing was persisted. Every other failure
/// shows up as a status inside the lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub timestamp: String,
    pub clusters: Vec<ClusterReport>,
    pub sentinels: Vec<SentinelSnapshot>,
    pub fatal: Option<FatalReason>,
}

impl PollResult {
    pub fn fatal(timestamp: String, reason: FatalReason) -> Self {
        Self {
            timestamp,
            clusters: Vec::new(),
            sentinels: Vec::new(),
            fatal: Some(reason),
        }
    }
}

/// Local wall-clock stamp shared by every row of a cycle's batch.
/// Second granularity, string-sortable.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
