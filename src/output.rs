//! Text rendering for live reports and history queries.
//!
//! Presentation only: everything here consumes a `PollResult` or rows
//! read back from the store. Tables show absent measurements as `n/a`;
//! CSV leaves the field empty so spreadsheets see a real NULL.

use crate::snapshot::{NodeSnapshot, PollResult};
use crate::store::{Page, SentinelHistoryRow};

pub fn print_poll_result(result: &PollResult) {
    println!("\n=== Redis Cluster Observability ===");

    if let Some(reason) = &result.fatal {
        println!("\n!! cycle failed: {}", reason);
        println!();
        return;
    }

    if result.clusters.is_empty() {
        println!("\nSentinel is reachable, but no masters are monitored.");
    }

    for report in &result.clusters {
        println!("\nCluster: {}  (master {})", report.cluster, report.master);
        println!(
            "  Master Health: {} | Keys: {} | Memory: {} | Replicas: {}",
            report.master_status,
            opt_u64(report.master_keys),
            opt_str(report.master_memory.as_deref()),
            report.replica_count
        );

        if report.nodes.is_empty() {
            println!("  (no nodes probed)");
            continue;
        }

        println!(
            "  {:<8} {:<22} {:<6} {:<16} {:<10} {:<8} {:<10}",
            "Role", "Host", "Port", "Health", "Keys", "Clients", "Memory"
        );
        println!("  {:-<84}", "");
        for node in &report.nodes {
            println!(
                "  {:<8} {:<22} {:<6} {:<16} {:<10} {:<8} {:<10}",
                node.role.as_str(),
                node.endpoint.host,
                node.endpoint.port,
                node.health.as_str(),
                opt_u64(node.keys),
                opt_u32(node.clients),
                opt_str(node.memory.as_deref())
            );
        }
    }

    println!("\n[Sentinel Network]");
    if result.sentinels.is_empty() {
        println!("  (no sentinels configured)");
    } else {
        let healthy = result
            .sentinels
            .iter()
            .filter(|s| s.status.is_healthy())
            .count();
        let max_masters = result
            .sentinels
            .iter()
            .map(|s| s.masters_monitored)
            .max()
            .unwrap_or(0);
        let tilted = result.sentinels.iter().filter(|s| s.is_tilt).count();
        println!(
            "  Active Sentinels: {}/{} | Masters Monitored: {} | Tilt/Script Issues: {}",
            healthy,
            result.sentinels.len(),
            max_masters,
            tilted
        );

        println!(
            "  {:<22} {:<6} {:<16} {:<8} {:<6} {:<8}",
            "Host", "Port", "Status", "Masters", "Tilt", "Scripts"
        );
        println!("  {:-<70}", "");
        for s in &result.sentinels {
            println!(
                "  {:<22} {:<6} {:<16} {:<8} {:<6} {:<8}",
                s.endpoint.host,
                s.endpoint.port,
                s.status.as_str(),
                s.masters_monitored,
                if s.is_tilt { "yes" } else { "no" },
                s.running_scripts
            );
        }
    }

    println!("\nLast updated: {}", result.timestamp);
    println!();
}

pub fn print_node_history(rows: &[NodeSnapshot], page: Page, total: u64, cluster: Option<&str>) {
    match cluster {
        Some(name) => println!("\n=== Node History (cluster: {}) ===", name),
        None => println!("\n=== Node History ==="),
    }
    if rows.is_empty() {
        println!("No historical node data found.");
        return;
    }

    println!(
        "{:<20} {:<16} {:<22} {:<6} {:<8} {:<16} {:<10} {:<8} {:<10}",
        "Timestamp", "Cluster", "Host", "Port", "Role", "Health", "Keys", "Clients", "Memory"
    );
    println!("{:-<120}", "");
    for row in rows {
        println!(
            "{:<20} {:<16} {:<22} {:<6} {:<8} {:<16} {:<10} {:<8} {:<10}",
            row.timestamp,
            row.cluster,
            row.endpoint.host,
            row.endpoint.port,
            row.role.as_str(),
            row.health.as_str(),
            opt_u64(row.keys),
            opt_u32(row.clients),
            opt_str(row.memory.as_deref())
        );
    }
    println!(
        "\npage {}/{} ({} rows total)",
        page.index as u64 + 1,
        page_count(total, page.size),
        total
    );
}

pub fn print_sentinel_history(rows: &[SentinelHistoryRow], page: Page, total: u64) {
    println!("\n=== Sentinel History ===");
    if rows.is_empty() {
        println!("No historical sentinel data found.");
        return;
    }

    println!(
        "{:<8} {:<20} {:<22} {:<6} {:<8} {:<6} {:<8}",
        "Id", "Timestamp", "Host", "Port", "Masters", "Tilt", "Scripts"
    );
    println!("{:-<82}", "");
    for row in rows {
        println!(
            "{:<8} {:<20} {:<22} {:<6} {:<8} {:<6} {:<8}",
            row.id,
            row.timestamp,
            row.endpoint.host,
            row.endpoint.port,
            row.masters_monitored,
            if row.is_tilt { "yes" } else { "no" },
            row.running_scripts
        );
    }
    println!(
        "\npage {}/{} ({} rows total)",
        page.index as u64 + 1,
        page_count(total, page.size),
        total
    );
}

pub fn print_cluster_names(names: &[String]) {
    if names.is_empty() {
        println!("No clusters in history.");
        return;
    }
    for name in names {
        println!("{}", name);
    }
}

/// Full node history as CSV, columns in stored order.
pub fn node_history_csv(rows: &[NodeSnapshot]) -> String {
    let mut out = String::from(
        "timestamp,cluster_name,role,host,port,health,keys,clients,memory,master_host,master_port\n",
    );
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            csv_field(&row.timestamp),
            csv_field(&row.cluster),
            row.role.as_str(),
            csv_field(&row.endpoint.host),
            row.endpoint.port,
            csv_field(row.health.as_str()),
            row.keys.map(|v| v.to_string()).unwrap_or_default(),
            row.clients.map(|v| v.to_string()).unwrap_or_default(),
            csv_field(row.memory.as_deref().unwrap_or("")),
            csv_field(&row.master.host),
            row.master.port
        ));
    }
    out
}

/// Full sentinel history as CSV. `is_tilt` keeps the stored 0/1 shape.
pub fn sentinel_history_csv(rows: &[SentinelHistoryRow]) -> String {
    let mut out =
        String::from("id,timestamp,host,port,masters_monitored,is_tilt,running_scripts\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            row.id,
            csv_field(&row.timestamp),
            csv_field(&row.endpoint.host),
            row.endpoint.port,
            row.masters_monitored,
            row.is_tilt as u8,
            row.running_scripts
        ));
    }
    out
}

fn opt_u64(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn opt_u32(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn opt_str(v: Option<&str>) -> String {
    v.unwrap_or("n/a").to_string()
}

fn page_count(total: u64, size: u32) -> u64 {
    if total == 0 {
        return 1;
    }
    total.div_ceil(size.max(1) as u64)
}

/// Quote a CSV field only when it needs it.
fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::snapshot::{HealthStatus, NodeRole};

    fn snapshot(keys: Option<u64>) -> NodeSnapshot {
        NodeSnapshot {
            timestamp: "2024-05-01 12:00:00".to_string(),
            cluster: "orders".to_string(),
            role: NodeRole::Master,
            endpoint: Endpoint::new("10.0.0.10", 6379),
            health: if keys.is_some() {
                HealthStatus::Healthy
            } else {
                HealthStatus::DownOrError
            },
            keys,
            clients: keys.map(|_| 3),
            memory: keys.map(|_| "1.2M".to_string()),
            master: Endpoint::new("10.0.0.10", 6379),
        }
    }

    #[test]
    fn test_node_csv_rows() {
        let csv = node_history_csv(&[snapshot(Some(120)), snapshot(None)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,cluster_name,role,host,port,health,keys,clients,memory,master_host,master_port"
        );
        assert_eq!(
            lines[1],
            "2024-05-01 12:00:00,orders,master,10.0.0.10,6379,Healthy,120,3,1.2M,10.0.0.10,6379"
        );
        // absent measurements are empty fields, not "n/a"
        assert_eq!(
            lines[2],
            "2024-05-01 12:00:00,orders,master,10.0.0.10,6379,Down/Error,,,,10.0.0.10,6379"
        );
    }

    #[test]
    fn test_csv_quotes_when_needed() {
        let mut snap = snapshot(Some(1));
        snap.cluster = "orders,eu".to_string();
        let csv = node_history_csv(&[snap]);
        assert!(csv.contains("\"orders,eu\""));
    }

    #[test]
    fn test_sentinel_csv_rows() {
        let row = SentinelHistoryRow {
            id: 7,
            timestamp: "2024-05-01 12:00:00".to_string(),
            endpoint: Endpoint::new("10.0.2.1", 26379),
            masters_monitored: 2,
            is_tilt: true,
            running_scripts: 0,
        };
        let csv = sentinel_history_csv(&[row]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,timestamp,host,port,masters_monitored,is_tilt,running_scripts"
        );
        assert_eq!(lines[1], "7,2024-05-01 12:00:00,10.0.2.1,26379,2,1,0");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 5000), 1);
        assert_eq!(page_count(5000, 5000), 1);
        assert_eq!(page_count(5001, 5000), 2);
        assert_eq!(page_count(7000, 5000), 2);
    }
}
