//! Network endpoints as `host:port` pairs.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// A reachable address of a Redis node or Sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address string suitable for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port in '{}'", s)))?;
                Ok(Self::new(host, port))
            }
            _ => Err(Error::Config(format!("invalid endpoint '{}'", s))),
        }
    }
}

/// Parse a comma-separated `host:port` list, skipping malformed entries.
///
/// Used for the `sentinels` config directive and the matching CLI flag.
pub fn parse_endpoint_list(raw: &str) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.parse::<Endpoint>() {
            Ok(ep) => endpoints.push(ep),
            Err(_) => log::warn!("skipping malformed endpoint '{}'", part),
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let ep: Endpoint = "10.0.0.5:26379".parse().unwrap();
        assert_eq!(ep.host, "10.0.0.5");
        assert_eq!(ep.port, 26379);
        assert_eq!(ep.addr(), "10.0.0.5:26379");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":6379".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_parse_endpoint_list_skips_malformed() {
        let eps = parse_endpoint_list("127.0.0.1:26379, 10.0.0.2:26380,bogus, ,10.0.0.3:x");
        assert_eq!(
            eps,
            vec![
                Endpoint::new("127.0.0.1", 26379),
                Endpoint::new("10.0.0.2", 26380),
            ]
        );
    }

    #[test]
    fn test_display_round_trip() {
        let ep = Endpoint::new("redis-1.internal", 6379);
        let back: Endpoint = ep.to_string().parse().unwrap();
        assert_eq!(back, ep);
    }
}
