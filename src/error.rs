use std::time::Duration;

use thiserror::Error;

/// Why an entire polling cycle was abandoned.
///
/// Only two conditions qualify: no configured Sentinel answered, or the
/// master enumeration call itself failed. Every other failure is folded
/// into a health status on the affected snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    SentinelUnreachable,
    MastersQueryFailed(String),
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SentinelUnreachable => write!(f, "no configured sentinel is reachable"),
            Self::MastersQueryFailed(msg) => write!(f, "master enumeration failed: {}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {0} failed: {1}")]
    Connect(String, String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("replica discovery for '{0}' failed: {1}")]
    Discovery(String, String),

    #[error("{0}")]
    Fatal(FatalReason),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
