use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{parse_config_file, MonitorConfig};
use crate::endpoint::parse_endpoint_list;
use crate::error::{Error, Result};
use crate::store::DEFAULT_PAGE_SIZE;

#[derive(Parser, Debug)]
#[command(name = "redwatch")]
#[command(version = "0.1.0")]
#[command(about = "Redis Sentinel cluster health monitor", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sentinel endpoints as host:port, comma separated
    #[arg(long, value_name = "LIST")]
    pub sentinels: Option<String>,

    /// History database file
    #[arg(long, value_name = "FILE")]
    pub history_file: Option<String>,

    /// Seconds between cycles in watch mode (0 polls once)
    #[arg(long)]
    pub refresh_interval: Option<u64>,

    /// Log level (debug, verbose, notice, warning, nothing)
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log file path (stderr when unset)
    #[arg(long)]
    pub logfile: Option<String>,

    /// Cap on concurrently running probes
    #[arg(long)]
    pub probe_concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one polling cycle and print the report
    Poll,
    /// Poll repeatedly at the configured interval
    Watch,
    /// Query snapshot history
    History {
        #[command(subcommand)]
        what: HistoryCommand,
    },
    /// List cluster names seen in history
    Clusters,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Node observations, newest first
    Nodes {
        /// Only rows for this cluster
        #[arg(long)]
        cluster: Option<String>,

        /// Page index, 0 is the newest page
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Rows per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Emit the full filtered history as CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
    /// Sentinel observations, newest first
    Sentinels {
        /// Page index, 0 is the newest page
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Rows per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Emit the full history as CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
}

impl Cli {
    /// Resolve the effective configuration: the config file when one is
    /// given, then flag overrides on top.
    ///
    /// A missing or unreadable config file falls back to defaults with
    /// a warning rather than refusing to start; the monitor is most
    /// needed exactly when machines are misbehaving.
    pub fn load_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => match parse_config_file(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: {}; using defaults", e);
                    MonitorConfig::default()
                }
            },
            None => MonitorConfig::default(),
        };

        if let Some(raw) = &self.sentinels {
            let endpoints = parse_endpoint_list(raw);
            if endpoints.is_empty() {
                return Err(Error::Config(format!("no valid endpoints in '{}'", raw)));
            }
            config.sentinels = endpoints;
        }
        if let Some(path) = &self.history_file {
            config.history_file = path.clone();
        }
        if let Some(secs) = self.refresh_interval {
            config.refresh_interval_secs = secs;
        }
        if let Some(level) = &self.loglevel {
            config.loglevel = level.clone();
        }
        if let Some(path) = &self.logfile {
            config.logfile = path.clone();
        }
        if let Some(cap) = self.probe_concurrency {
            config.probe_concurrency = cap;
        }

        Ok(config)
    }
}
