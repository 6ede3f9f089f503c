//! Cycle orchestration.
//!
//! `poll_once` walks one cycle: locate a Sentinel, enumerate masters and
//! replicas through it, fan node and Sentinel probes out under the
//! concurrency cap, persist both batches, fold everything into a
//! `PollResult`. It always returns a result; the two fatal conditions
//! (no reachable Sentinel, failed master enumeration) come back as a
//! fatal reason with empty lists, everything else as statuses.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::MonitorConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, FatalReason};
use crate::monitor::topology::MasterInfo;
use crate::monitor::{locator, probe, topology};
use crate::snapshot::{
    now_stamp, ClusterReport, HealthStatus, NodeRole, NodeSnapshot, PollResult, SentinelSnapshot,
};
use crate::store::SnapshotStore;

/// What the cycle decided to do about one discovered master.
enum ClusterPlan {
    /// Probe the master and the replicas Sentinel announced for it.
    Probe {
        master: MasterInfo,
        replicas: Vec<Endpoint>,
    },
    /// Replica discovery failed; report the cluster without probing.
    DiscoveryFailed { master: MasterInfo },
}

pub struct PollingEngine {
    config: MonitorConfig,
    store: Arc<SnapshotStore>,
}

impl PollingEngine {
    pub fn new(config: MonitorConfig, store: Arc<SnapshotStore>) -> Self {
        Self { config, store }
    }

    /// Run one full polling cycle.
    ///
    /// Never returns an error. A fatal cycle produces a result with the
    /// reason set and empty lists; nothing is persisted for it.
    pub async fn poll_once(&self) -> PollResult {
        let timestamp = now_stamp();

        let mut conn =
            match locator::locate(&self.config.sentinels, self.config.sentinel_timeout()).await {
                Ok(conn) => conn,
                Err(_) => return PollResult::fatal(timestamp, FatalReason::SentinelUnreachable),
            };

        let mut masters = match topology::discover_masters(&mut conn).await {
            Ok(masters) => masters,
            Err(Error::Fatal(reason)) => return PollResult::fatal(timestamp, reason),
            Err(e) => {
                return PollResult::fatal(
                    timestamp,
                    FatalReason::MastersQueryFailed(e.to_string()),
                )
            }
        };
        // announcement order is the Sentinel's hash order; sort for
        // stable reports across cycles
        masters.sort_by(|a, b| a.name.cmp(&b.name));

        if masters.is_empty() {
            log::warn!("sentinel {} is reachable but monitors no masters", conn.addr());
        }

        // Replica discovery stays on the located connection; a failure
        // here is scoped to its master.
        let mut plans = Vec::with_capacity(masters.len());
        for master in masters {
            match topology::discover_replicas(&mut conn, &master.name).await {
                Ok(replicas) => plans.push(ClusterPlan::Probe { master, replicas }),
                Err(e) => {
                    log::warn!("{}", e);
                    plans.push(ClusterPlan::DiscoveryFailed { master });
                }
            }
        }
        drop(conn);

        let clusters = self.probe_clusters(plans, &timestamp).await;
        let sentinels = self.probe_sentinels(&timestamp).await;
        self.persist(&clusters, &sentinels);

        let healthy = clusters
            .iter()
            .filter(|c| c.master_status.is_healthy())
            .count();
        log::info!(
            "cycle complete: {}/{} masters healthy, {} sentinels probed",
            healthy,
            clusters.len(),
            sentinels.len()
        );

        PollResult {
            timestamp,
            clusters,
            sentinels,
            fatal: None,
        }
    }

    /// Probe every node of every probeable cluster and reassemble the
    /// reports in discovery order, master first.
    ///
    /// All probes of the cycle share one semaphore so small deployments
    /// are not hit by an unbounded connection burst.
    async fn probe_clusters(&self, plans: Vec<ClusterPlan>, timestamp: &str) -> Vec<ClusterReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.probe_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        let mut slots: Vec<Vec<Option<NodeSnapshot>>> = plans
            .iter()
            .map(|plan| match plan {
                ClusterPlan::Probe { replicas, .. } => vec![None; replicas.len() + 1],
                ClusterPlan::DiscoveryFailed { .. } => Vec::new(),
            })
            .collect();

        for (ci, plan) in plans.iter().enumerate() {
            let (master, replicas) = match plan {
                ClusterPlan::Probe { master, replicas } => (master, replicas),
                ClusterPlan::DiscoveryFailed { .. } => continue,
            };

            let nodes = std::iter::once((NodeRole::Master, master.endpoint.clone()))
                .chain(replicas.iter().map(|ep| (NodeRole::Replica, ep.clone())));

            for (ni, (role, endpoint)) in nodes.enumerate() {
                let semaphore = Arc::clone(&semaphore);
                let cluster = master.name.clone();
                let master_ep = master.endpoint.clone();
                let timestamp = timestamp.to_string();
                let deadline = self.config.node_timeout();
                join_set.spawn(async move {
                    // the semaphore is never closed, so acquire cannot fail
                    let _permit = semaphore.acquire_owned().await.ok();
                    let snap = probe::probe_node(
                        &cluster, role, &endpoint, &master_ep, &timestamp, deadline,
                    )
                    .await;
                    (ci, ni, snap)
                });
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((ci, ni, snap)) => slots[ci][ni] = Some(snap),
                Err(e) => log::error!("node probe task failed: {}", e),
            }
        }

        let mut reports = Vec::with_capacity(plans.len());
        for (ci, plan) in plans.into_iter().enumerate() {
            match plan {
                ClusterPlan::DiscoveryFailed { master } => reports.push(ClusterReport {
                    cluster: master.name,
                    master: master.endpoint,
                    master_status: HealthStatus::DiscoveryError,
                    replica_count: 0,
                    master_keys: None,
                    master_memory: None,
                    nodes: Vec::new(),
                }),
                ClusterPlan::Probe { master, replicas } => {
                    let nodes: Vec<NodeSnapshot> = slots[ci].drain(..).flatten().collect();
                    let (master_status, master_keys, master_memory) =
                        match nodes.iter().find(|n| n.role == NodeRole::Master) {
                            Some(s) => (s.health, s.keys, s.memory.clone()),
                            None => (HealthStatus::DownOrError, None, None),
                        };
                    reports.push(ClusterReport {
                        cluster: master.name,
                        master: master.endpoint,
                        master_status,
                        replica_count: replicas.len(),
                        master_keys,
                        master_memory,
                        nodes,
                    });
                }
            }
        }
        reports
    }

    /// Probe every configured Sentinel, results in configuration order.
    async fn probe_sentinels(&self, timestamp: &str) -> Vec<SentinelSnapshot> {
        let semaphore = Arc::new(Semaphore::new(self.config.probe_concurrency.max(1)));
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<SentinelSnapshot>> = vec![None; self.config.sentinels.len()];

        for (i, endpoint) in self.config.sentinels.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let endpoint = endpoint.clone();
            let timestamp = timestamp.to_string();
            let deadline = self.config.node_timeout();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (i, probe::probe_sentinel(&endpoint, &timestamp, deadline).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((i, snap)) => slots[i] = Some(snap),
                Err(e) => log::error!("sentinel probe task failed: {}", e),
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Best-effort persistence. Failed writes are logged; history never
    /// gates the live report.
    fn persist(&self, clusters: &[ClusterReport], sentinels: &[SentinelSnapshot]) {
        let nodes: Vec<NodeSnapshot> = clusters
            .iter()
            .flat_map(|c| c.nodes.iter().cloned())
            .collect();
        if !nodes.is_empty() {
            match self.store.save_node_snapshots(&nodes) {
                Ok(written) => log::debug!("persisted {} node rows", written),
                Err(e) => log::warn!("failed to persist node snapshots: {}", e),
            }
        }
        if !sentinels.is_empty() {
            match self.store.save_sentinel_snapshots(sentinels) {
                Ok(written) => log::debug!("persisted {} sentinel rows", written),
                Err(e) => log::warn!("failed to persist sentinel snapshots: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn bulk(s: &str) -> String {
        format!("${}\r\n{}\r\n", s.len(), s)
    }

    /// One flat key/value entry the way SENTINEL MASTERS/REPLICAS
    /// answers them.
    fn kv_entry(fields: &[(&str, &str)]) -> String {
        let mut out = format!("*{}\r\n", fields.len() * 2);
        for (key, value) in fields {
            out.push_str(&bulk(key));
            out.push_str(&bulk(value));
        }
        out
    }

    fn entry_array(entries: &[String]) -> String {
        format!("*{}\r\n{}", entries.len(), entries.concat())
    }

    fn master_entry(name: &str, ep: &Endpoint) -> String {
        kv_entry(&[
            ("name", name),
            ("ip", &ep.host),
            ("port", &ep.port.to_string()),
            ("flags", "master"),
        ])
    }

    fn replica_entry(ep: &Endpoint) -> String {
        kv_entry(&[
            ("name", &ep.addr()),
            ("ip", &ep.host),
            ("port", &ep.port.to_string()),
            ("flags", "slave"),
        ])
    }

    const SENTINEL_INFO: &str =
        "# Sentinel\r\nsentinel_masters:1\r\nsentinel_tilt:0\r\nsentinel_running_scripts:0\r\n";

    const TILTED_SENTINEL_INFO: &str =
        "# Sentinel\r\nsentinel_masters:1\r\nsentinel_tilt:1\r\nsentinel_running_scripts:0\r\n";

    /// Scripted Sentinel: canned MASTERS/REPLICAS replies, an INFO
    /// payload, PONG for everything else.
    async fn spawn_sentinel(
        masters_reply: String,
        replicas: HashMap<String, String>,
        info: String,
    ) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let masters_reply = masters_reply.clone();
                let replicas = replicas.clone();
                let info = info.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        let n = match sock.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => n,
                        };
                        let req = String::from_utf8_lossy(&buf[..n]).to_uppercase();
                        // `INFO sentinel` contains "SENTINEL", so the
                        // subcommand checks come first
                        let reply = if req.contains("MASTERS") {
                            masters_reply.clone()
                        } else if req.contains("REPLICAS") {
                            replicas
                                .iter()
                                .find(|(name, _)| req.contains(&name.to_uppercase()))
                                .map(|(_, reply)| reply.clone())
                                .unwrap_or_else(|| "*0\r\n".to_string())
                        } else if req.contains("INFO") {
                            format!("${}\r\n{}\r\n", info.len(), info)
                        } else {
                            "+PONG\r\n".to_string()
                        };
                        if sock.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    /// Scripted data node answering INFO, DBSIZE and PING.
    async fn spawn_node(info: &'static str, dbsize: i64) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        let n = match sock.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => n,
                        };
                        let req = String::from_utf8_lossy(&buf[..n]).to_uppercase();
                        let reply = if req.contains("DBSIZE") {
                            format!(":{}\r\n", dbsize)
                        } else if req.contains("PING") {
                            "+PONG\r\n".to_string()
                        } else {
                            format!("${}\r\n{}\r\n", info.len(), info)
                        };
                        if sock.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    async fn dead_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    fn engine_with(sentinels: Vec<Endpoint>) -> (PollingEngine, Arc<SnapshotStore>) {
        let store = Arc::new(SnapshotStore::open_in_memory().unwrap());
        let config = MonitorConfig {
            sentinels,
            ..MonitorConfig::default()
        };
        (PollingEngine::new(config, Arc::clone(&store)), store)
    }

    const MASTER_INFO: &str =
        "role:master\r\nconnected_clients:3\r\nused_memory_human:1.2M\r\n";
    const REPLICA_INFO: &str =
        "role:slave\r\nconnected_clients:1\r\nused_memory_human:0.9M\r\n";

    #[tokio::test]
    async fn test_no_reachable_sentinel_is_fatal() {
        let a = dead_endpoint().await;
        let b = dead_endpoint().await;
        let (engine, store) = engine_with(vec![a, b]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, Some(FatalReason::SentinelUnreachable));
        assert!(result.clusters.is_empty());
        assert!(result.sentinels.is_empty());
        // a fatal cycle persists nothing
        assert_eq!(store.count_node_history(None).unwrap(), 0);
        assert_eq!(store.count_sentinel_history().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_masters_query_is_fatal() {
        let sentinel = spawn_sentinel(
            "-ERR unknown command 'SENTINEL'\r\n".to_string(),
            HashMap::new(),
            SENTINEL_INFO.to_string(),
        )
        .await;
        let (engine, store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        match result.fatal {
            Some(FatalReason::MastersQueryFailed(msg)) => assert!(msg.contains("unknown command")),
            other => panic!("expected masters failure, got {:?}", other),
        }
        assert!(result.clusters.is_empty());
        assert!(result.sentinels.is_empty());
        assert_eq!(store.count_sentinel_history().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_masters_still_probes_sentinels() {
        let sentinel = spawn_sentinel(
            "*0\r\n".to_string(),
            HashMap::new(),
            SENTINEL_INFO.to_string(),
        )
        .await;
        let (engine, store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, None);
        assert!(result.clusters.is_empty());
        assert_eq!(result.sentinels.len(), 1);
        assert_eq!(result.sentinels[0].status, HealthStatus::Healthy);
        assert_eq!(store.count_node_history(None).unwrap(), 0);
        assert_eq!(store.count_sentinel_history().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mixed_health_cluster() {
        let master = spawn_node(MASTER_INFO, 120).await;
        let good_replica = spawn_node(REPLICA_INFO, 120).await;
        let bad_replica = dead_endpoint().await;

        let masters_reply = entry_array(&[master_entry("orders", &master)]);
        let mut replicas = HashMap::new();
        replicas.insert(
            "orders".to_string(),
            entry_array(&[replica_entry(&good_replica), replica_entry(&bad_replica)]),
        );
        let sentinel = spawn_sentinel(masters_reply, replicas, SENTINEL_INFO.to_string()).await;
        let (engine, store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, None);
        assert_eq!(result.clusters.len(), 1);
        let report = &result.clusters[0];
        assert_eq!(report.cluster, "orders");
        assert_eq!(report.master, master);
        assert_eq!(report.master_status, HealthStatus::Healthy);
        assert_eq!(report.master_keys, Some(120));
        assert_eq!(report.master_memory.as_deref(), Some("1.2M"));
        assert_eq!(report.replica_count, 2);
        assert_eq!(report.nodes.len(), 3);

        // master first, replicas in announcement order
        assert_eq!(report.nodes[0].role, NodeRole::Master);
        assert_eq!(report.nodes[0].clients, Some(3));
        assert_eq!(report.nodes[1].endpoint, good_replica);
        assert_eq!(report.nodes[1].health, HealthStatus::Healthy);
        assert_eq!(report.nodes[2].endpoint, bad_replica);
        assert_eq!(report.nodes[2].health, HealthStatus::DownOrError);
        assert_eq!(report.nodes[2].keys, None);

        // every node row carries its master endpoint
        assert!(report.nodes.iter().all(|n| n.master == master));

        assert_eq!(store.count_node_history(None).unwrap(), 3);
        assert_eq!(store.count_sentinel_history().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cluster_reported_when_all_probes_fail() {
        let master = dead_endpoint().await;
        let replica = dead_endpoint().await;

        let masters_reply = entry_array(&[master_entry("orders", &master)]);
        let mut replicas = HashMap::new();
        replicas.insert("orders".to_string(), entry_array(&[replica_entry(&replica)]));
        let sentinel = spawn_sentinel(masters_reply, replicas, SENTINEL_INFO.to_string()).await;
        let (engine, store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, None);
        assert_eq!(result.clusters.len(), 1);
        let report = &result.clusters[0];
        assert_eq!(report.master_status, HealthStatus::DownOrError);
        assert_eq!(report.replica_count, 1);
        assert_eq!(report.nodes.len(), 2);
        assert!(report
            .nodes
            .iter()
            .all(|n| n.health == HealthStatus::DownOrError));
        assert!(report.nodes.iter().all(|n| n.keys.is_none()));

        // unreachable nodes still leave rows in history
        assert_eq!(store.count_node_history(None).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replica_discovery_failure_is_isolated() {
        let orders_master = spawn_node(MASTER_INFO, 42).await;
        let orders_replica = spawn_node(REPLICA_INFO, 42).await;
        let cache_master = spawn_node(MASTER_INFO, 7).await;

        let masters_reply = entry_array(&[
            master_entry("orders", &orders_master),
            master_entry("cache-01", &cache_master),
        ]);
        let mut replicas = HashMap::new();
        replicas.insert(
            "orders".to_string(),
            entry_array(&[replica_entry(&orders_replica)]),
        );
        replicas.insert(
            "cache-01".to_string(),
            "-ERR replica enumeration failed\r\n".to_string(),
        );
        let sentinel = spawn_sentinel(masters_reply, replicas, SENTINEL_INFO.to_string()).await;
        let (engine, store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, None);
        // reports come back sorted by cluster name
        assert_eq!(result.clusters.len(), 2);
        let cache = &result.clusters[0];
        assert_eq!(cache.cluster, "cache-01");
        assert_eq!(cache.master_status, HealthStatus::DiscoveryError);
        assert_eq!(cache.replica_count, 0);
        assert!(cache.nodes.is_empty());
        assert_eq!(cache.master_keys, None);

        let orders = &result.clusters[1];
        assert_eq!(orders.cluster, "orders");
        assert_eq!(orders.master_status, HealthStatus::Healthy);
        assert_eq!(orders.nodes.len(), 2);

        // only the probed cluster's rows reach history
        assert_eq!(store.count_node_history(None).unwrap(), 2);
        assert_eq!(store.count_node_history(Some("cache-01")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tilt_flag_propagates() {
        let sentinel = spawn_sentinel(
            "*0\r\n".to_string(),
            HashMap::new(),
            TILTED_SENTINEL_INFO.to_string(),
        )
        .await;
        let (engine, _store) = engine_with(vec![sentinel]);

        let result = engine.poll_once().await;

        assert_eq!(result.sentinels.len(), 1);
        assert!(result.sentinels[0].is_tilt);
        assert_eq!(result.sentinels[0].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unreachable_sentinel_row_keeps_config_order() {
        let dead = dead_endpoint().await;
        let live = spawn_sentinel(
            "*0\r\n".to_string(),
            HashMap::new(),
            SENTINEL_INFO.to_string(),
        )
        .await;
        let (engine, _store) = engine_with(vec![dead.clone(), live.clone()]);

        let result = engine.poll_once().await;

        assert_eq!(result.fatal, None);
        assert_eq!(result.sentinels.len(), 2);
        assert_eq!(result.sentinels[0].endpoint, dead);
        assert_eq!(result.sentinels[0].status, HealthStatus::DownOrError);
        assert!(result.sentinels[0].is_tilt);
        assert_eq!(result.sentinels[1].endpoint, live);
        assert_eq!(result.sentinels[1].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_history_grows_across_cycles() {
        let master = spawn_node(MASTER_INFO, 120).await;
        let masters_reply = entry_array(&[master_entry("orders", &master)]);
        let sentinel =
            spawn_sentinel(masters_reply, HashMap::new(), SENTINEL_INFO.to_string()).await;
        let (engine, store) = engine_with(vec![sentinel]);

        let first = engine.poll_once().await;
        let count_after_first = store.count_node_history(None).unwrap();
        let second = engine.poll_once().await;
        let count_after_second = store.count_node_history(None).unwrap();

        assert_eq!(count_after_first, 1);
        assert_eq!(count_after_second, 2);
        assert_eq!(first.clusters[0].nodes[0].endpoint, second.clusters[0].nodes[0].endpoint);
        assert_eq!(first.clusters[0].master_status, second.clusters[0].master_status);

        // newest first on read-back
        let rows = store.query_node_history(None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp >= rows[1].timestamp);
    }
}
