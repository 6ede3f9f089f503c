//! Health probes for data nodes and Sentinels.
//!
//! A probe never fails past its boundary. Whatever goes wrong on the
//! wire is folded into the snapshot it returns: a node that cannot be
//! reached or mid-probe errors becomes `Down/Error` with absent
//! measurements, a Sentinel that cannot be reached becomes a row with
//! zero masters and the tilt flag raised.

use std::time::Duration;

use crate::client::RedisConn;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::info::{NodeInfo, SentinelInfo};
use crate::snapshot::{HealthStatus, NodeRole, NodeSnapshot, SentinelSnapshot};

/// Probe one data node: INFO, DBSIZE, PING under the probe deadline.
pub async fn probe_node(
    cluster: &str,
    role: NodeRole,
    endpoint: &Endpoint,
    master: &Endpoint,
    timestamp: &str,
    deadline: Duration,
) -> NodeSnapshot {
    match try_probe_node(endpoint, deadline).await {
        Ok(outcome) => NodeSnapshot {
            timestamp: timestamp.to_string(),
            cluster: cluster.to_string(),
            role,
            endpoint: endpoint.clone(),
            health: outcome.health,
            keys: outcome.keys,
            clients: outcome.clients,
            memory: outcome.memory,
            master: master.clone(),
        },
        Err(e) => {
            log::warn!(
                "probe of {} node {} ({}) failed: {}",
                role,
                endpoint,
                cluster,
                e
            );
            NodeSnapshot {
                timestamp: timestamp.to_string(),
                cluster: cluster.to_string(),
                role,
                endpoint: endpoint.clone(),
                health: HealthStatus::DownOrError,
                keys: None,
                clients: None,
                memory: None,
                master: master.clone(),
            }
        }
    }
}

struct NodeProbeOutcome {
    health: HealthStatus,
    keys: Option<u64>,
    clients: Option<u32>,
    memory: Option<String>,
}

async fn try_probe_node(endpoint: &Endpoint, deadline: Duration) -> Result<NodeProbeOutcome> {
    let mut conn = RedisConn::connect(endpoint, deadline).await?;

    let raw = conn.info(None).await?;
    let info = NodeInfo::parse(&raw);
    let keys = conn.dbsize().await?;
    let alive = conn.ping().await?;

    Ok(NodeProbeOutcome {
        health: if alive {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        keys: Some(keys),
        clients: info.connected_clients,
        memory: info.used_memory_human,
    })
}

/// Probe one Sentinel: PING, then `INFO sentinel`.
///
/// The failure row raises the tilt flag: an unobservable Sentinel must
/// not read as a calm one.
pub async fn probe_sentinel(
    endpoint: &Endpoint,
    timestamp: &str,
    deadline: Duration,
) -> SentinelSnapshot {
    match try_probe_sentinel(endpoint, deadline).await {
        Ok((alive, info)) => SentinelSnapshot {
            timestamp: timestamp.to_string(),
            endpoint: endpoint.clone(),
            status: if alive {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            masters_monitored: info.masters.unwrap_or(0),
            is_tilt: info.tilt.unwrap_or(false),
            running_scripts: info.running_scripts.unwrap_or(0),
        },
        Err(e) => {
            log::warn!("sentinel {} probe failed: {}", endpoint, e);
            SentinelSnapshot {
                timestamp: timestamp.to_string(),
                endpoint: endpoint.clone(),
                status: HealthStatus::DownOrError,
                masters_monitored: 0,
                is_tilt: true,
                running_scripts: 0,
            }
        }
    }
}

async fn try_probe_sentinel(
    endpoint: &Endpoint,
    deadline: Duration,
) -> Result<(bool, SentinelInfo)> {
    let mut conn = RedisConn::connect(endpoint, deadline).await?;
    let alive = conn.ping().await?;
    let raw = conn.info(Some("sentinel")).await?;
    Ok((alive, SentinelInfo::parse(&raw)))
}
