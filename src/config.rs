//! Monitor configuration.
//!
//! Loaded once at startup from an optional directive file plus CLI
//! overrides, then passed around by reference. Nothing here is global
//! state.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::endpoint::{parse_endpoint_list, Endpoint, DEFAULT_SENTINEL_PORT};
use crate::error::{Error, Result};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_HISTORY_FILE: &str = "redis_health_history.db";
pub const DEFAULT_PROBE_CONCURRENCY: usize = 16;

/// Budget for reaching a Sentinel during location (milliseconds).
pub const DEFAULT_SENTINEL_TIMEOUT_MS: u64 = 2000;
/// Budget for each node or Sentinel health probe (milliseconds).
pub const DEFAULT_NODE_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sentinel candidates, tried in order during location. Never empty.
    pub sentinels: Vec<Endpoint>,
    /// Seconds between cycles in watch mode. 0 disables re-polling.
    pub refresh_interval_secs: u64,
    /// SQLite file holding the snapshot history.
    pub history_file: String,
    pub loglevel: String,
    /// Empty means log to stderr.
    pub logfile: String,
    /// Cap on concurrently running probes.
    pub probe_concurrency: usize,
    pub sentinel_timeout_ms: u64,
    pub node_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sentinels: vec![Endpoint::new("127.0.0.1", DEFAULT_SENTINEL_PORT)],
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            history_file: DEFAULT_HISTORY_FILE.to_string(),
            loglevel: "notice".to_string(),
            logfile: String::new(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            sentinel_timeout_ms: DEFAULT_SENTINEL_TIMEOUT_MS,
            node_timeout_ms: DEFAULT_NODE_TIMEOUT_MS,
        }
    }
}

impl MonitorConfig {
    pub fn sentinel_timeout(&self) -> Duration {
        Duration::from_millis(self.sentinel_timeout_ms)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }
}

/// Parse a monitor configuration file.
///
/// One directive per line; `#` starts a comment; unknown directives are
/// ignored for compatibility. Any `sentinel`/`sentinels` directives
/// replace the default candidate list rather than extending it.
pub fn parse_config_file(path: &Path) -> Result<MonitorConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file: {}", e)))?;

    let mut config = MonitorConfig::default();
    let mut sentinels: Vec<Endpoint> = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = parse_config_line(line, &mut config, &mut sentinels) {
            eprintln!("Warning: line {}: {}", line_num + 1, e);
        }
    }

    if !sentinels.is_empty() {
        config.sentinels = sentinels;
    }
    if config.sentinels.is_empty() {
        config.sentinels = vec![Endpoint::new("127.0.0.1", DEFAULT_SENTINEL_PORT)];
    }

    Ok(config)
}

fn parse_config_line(
    line: &str,
    config: &mut MonitorConfig,
    sentinels: &mut Vec<Endpoint>,
) -> std::result::Result<(), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(());
    }

    let directive = parts[0].to_lowercase();

    match directive.as_str() {
        "sentinel" => {
            // sentinel <host> <port>
            if parts.len() < 3 {
                return Err("sentinel directive requires host and port".to_string());
            }
            let port: u16 = parts[2]
                .parse()
                .map_err(|_| "invalid port in sentinel directive".to_string())?;
            sentinels.push(Endpoint::new(parts[1], port));
        }
        "sentinels" => {
            // sentinels <host:port,host:port,...>
            if parts.len() < 2 {
                return Err("sentinels directive requires a host:port list".to_string());
            }
            sentinels.extend(parse_endpoint_list(parts[1]));
        }
        "refresh-interval-seconds" => {
            if parts.len() < 2 {
                return Err("refresh-interval-seconds requires a value".to_string());
            }
            config.refresh_interval_secs = parts[1]
                .parse()
                .map_err(|_| "invalid refresh-interval-seconds".to_string())?;
        }
        "history-file" => {
            if parts.len() < 2 {
                return Err("history-file directive requires a path".to_string());
            }
            config.history_file = parts[1].to_string();
        }
        "loglevel" => {
            if parts.len() < 2 {
                return Err("loglevel directive requires a value".to_string());
            }
            config.loglevel = parts[1].to_string();
        }
        "logfile" => {
            if parts.len() < 2 {
                return Err("logfile directive requires a path".to_string());
            }
            config.logfile = parts[1].to_string();
        }
        "probe-concurrency" => {
            if parts.len() < 2 {
                return Err("probe-concurrency requires a value".to_string());
            }
            config.probe_concurrency = parts[1]
                .parse()
                .map_err(|_| "invalid probe-concurrency".to_string())?;
        }
        "sentinel-timeout-ms" => {
            if parts.len() < 2 {
                return Err("sentinel-timeout-ms requires a value".to_string());
            }
            config.sentinel_timeout_ms = parts[1]
                .parse()
                .map_err(|_| "invalid sentinel-timeout-ms".to_string())?;
        }
        "node-timeout-ms" => {
            if parts.len() < 2 {
                return Err("node-timeout-ms requires a value".to_string());
            }
            config.node_timeout_ms = parts[1]
                .parse()
                .map_err(|_| "invalid node-timeout-ms".to_string())?;
        }
        _ => {
            // Ignore unknown directives for compatibility
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.sentinels, vec![Endpoint::new("127.0.0.1", 26379)]);
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.history_file, "redis_health_history.db");
        assert_eq!(config.node_timeout(), Duration::from_secs(1));
        assert_eq!(config.sentinel_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# monitor config").unwrap();
        writeln!(file, "sentinel 10.0.0.1 26379").unwrap();
        writeln!(file, "sentinel 10.0.0.2 26380").unwrap();
        writeln!(file, "refresh-interval-seconds 30").unwrap();
        writeln!(file, "history-file /var/lib/redwatch/history.db").unwrap();
        writeln!(file, "loglevel debug").unwrap();
        writeln!(file, "probe-concurrency 8").unwrap();
        file.flush().unwrap();

        let config = parse_config_file(file.path()).unwrap();
        assert_eq!(
            config.sentinels,
            vec![
                Endpoint::new("10.0.0.1", 26379),
                Endpoint::new("10.0.0.2", 26380),
            ]
        );
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.history_file, "/var/lib/redwatch/history.db");
        assert_eq!(config.loglevel, "debug");
        assert_eq!(config.probe_concurrency, 8);
    }

    #[test]
    fn test_sentinels_csv_directive() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sentinels 10.1.0.1:26379,10.1.0.2:26379").unwrap();
        file.flush().unwrap();

        let config = parse_config_file(file.path()).unwrap();
        assert_eq!(config.sentinels.len(), 2);
        assert_eq!(config.sentinels[1], Endpoint::new("10.1.0.2", 26379));
    }

    #[test]
    fn test_unknown_directive_ignored() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "some-future-directive on").unwrap();
        writeln!(file, "refresh-interval-seconds 5").unwrap();
        file.flush().unwrap();

        let config = parse_config_file(file.path()).unwrap();
        assert_eq!(config.refresh_interval_secs, 5);
    }

    #[test]
    fn test_bad_line_does_not_abort_parse() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sentinel 10.0.0.1 notaport").unwrap();
        writeln!(file, "sentinel 10.0.0.2 26379").unwrap();
        file.flush().unwrap();

        let config = parse_config_file(file.path()).unwrap();
        assert_eq!(config.sentinels, vec![Endpoint::new("10.0.0.2", 26379)]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(parse_config_file(Path::new("/nonexistent/monitor.conf")).is_err());
    }
}
