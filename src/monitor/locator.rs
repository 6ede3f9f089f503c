//! First-reachable Sentinel selection.

use std::time::Duration;

use crate::client::RedisConn;
use crate::endpoint::Endpoint;
use crate::error::{Error, FatalReason, Result};

/// Walk `candidates` in order and return a connection to the first
/// Sentinel that accepts a connection and answers PING. Unreachable
/// candidates are logged and skipped; exhausting the list is the fatal
/// no-sentinel condition.
pub async fn locate(candidates: &[Endpoint], deadline: Duration) -> Result<RedisConn> {
    for endpoint in candidates {
        match RedisConn::connect(endpoint, deadline).await {
            Ok(mut conn) => match conn.ping().await {
                Ok(true) => {
                    log::debug!("using sentinel {}", endpoint);
                    return Ok(conn);
                }
                Ok(false) => {
                    log::debug!("sentinel {} rejected PING", endpoint);
                }
                Err(e) => {
                    log::debug!("sentinel {} ping failed: {}", endpoint, e);
                }
            },
            Err(e) => {
                log::debug!("sentinel {} unreachable: {}", endpoint, e);
            }
        }
    }

    log::error!(
        "none of the {} configured sentinels is reachable",
        candidates.len()
    );
    Err(Error::Fatal(FatalReason::SentinelUnreachable))
}
