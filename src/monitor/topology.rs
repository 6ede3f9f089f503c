//! Cluster topology enumeration over a live Sentinel connection.
//!
//! `SENTINEL MASTERS` and `SENTINEL REPLICAS <name>` answer with arrays
//! of flat key/value bulk-string pairs; only `name`, `ip` and `port` are
//! read here. Entries missing one of those fields are skipped, but a
//! failed MASTERS call abandons the cycle while a failed REPLICAS call
//! is an error scoped to its cluster.

use crate::client::RedisConn;
use crate::endpoint::Endpoint;
use crate::error::{Error, FatalReason, Result};
use crate::resp::RespValue;

/// A master as announced by `SENTINEL MASTERS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterInfo {
    pub name: String,
    pub endpoint: Endpoint,
}

/// Enumerate the masters this Sentinel monitors, in announcement order.
///
/// An empty list is a valid result and distinct from a failed call.
pub async fn discover_masters(conn: &mut RedisConn) -> Result<Vec<MasterInfo>> {
    let reply = match conn.command(&[b"SENTINEL", b"MASTERS"]).await {
        Ok(r) => r,
        Err(e) => return Err(Error::Fatal(FatalReason::MastersQueryFailed(e.to_string()))),
    };

    let entries = match reply {
        RespValue::Array(items) => items,
        RespValue::NullArray => Vec::new(),
        RespValue::Error(e) => {
            return Err(Error::Fatal(FatalReason::MastersQueryFailed(
                String::from_utf8_lossy(&e).into_owned(),
            )));
        }
        other => {
            return Err(Error::Fatal(FatalReason::MastersQueryFailed(format!(
                "unexpected MASTERS reply {:?}",
                other
            ))));
        }
    };

    let mut masters = Vec::new();
    for entry in &entries {
        match parse_master_entry(entry) {
            Some(info) => masters.push(info),
            None => log::debug!("skipping malformed master entry"),
        }
    }
    Ok(masters)
}

/// Enumerate the replicas of one master, in announcement order.
pub async fn discover_replicas(conn: &mut RedisConn, master_name: &str) -> Result<Vec<Endpoint>> {
    let reply = match conn
        .command(&[b"SENTINEL", b"REPLICAS", master_name.as_bytes()])
        .await
    {
        Ok(r) => r,
        Err(e) => return Err(Error::Discovery(master_name.to_string(), e.to_string())),
    };

    let entries = match reply {
        RespValue::Array(items) => items,
        RespValue::NullArray => Vec::new(),
        RespValue::Error(e) => {
            return Err(Error::Discovery(
                master_name.to_string(),
                String::from_utf8_lossy(&e).into_owned(),
            ));
        }
        other => {
            return Err(Error::Discovery(
                master_name.to_string(),
                format!("unexpected REPLICAS reply {:?}", other),
            ));
        }
    };

    let mut replicas = Vec::new();
    for entry in &entries {
        match parse_endpoint_entry(entry) {
            Some(ep) => replicas.push(ep),
            None => log::debug!("skipping malformed replica entry for '{}'", master_name),
        }
    }
    Ok(replicas)
}

fn parse_master_entry(entry: &RespValue) -> Option<MasterInfo> {
    let pairs = match entry {
        RespValue::Array(items) => items,
        _ => return None,
    };
    let name = pair_field(pairs, "name")?;
    let endpoint = entry_endpoint(pairs)?;
    Some(MasterInfo { name, endpoint })
}

fn parse_endpoint_entry(entry: &RespValue) -> Option<Endpoint> {
    let pairs = match entry {
        RespValue::Array(items) => items,
        _ => return None,
    };
    entry_endpoint(pairs)
}

/// Look up a value in a flat key/value pair array.
fn pair_field(pairs: &[RespValue], key: &str) -> Option<String> {
    let mut i = 0;
    while i + 1 < pairs.len() {
        if pairs[i].as_str() == Some(key) {
            return pairs[i + 1].as_str().map(str::to_string);
        }
        i += 2;
    }
    None
}

fn entry_endpoint(pairs: &[RespValue]) -> Option<Endpoint> {
    let ip = pair_field(pairs, "ip")?;
    let port: u16 = pair_field(pairs, "port")?.parse().ok()?;
    Some(Endpoint::new(ip, port))
}
