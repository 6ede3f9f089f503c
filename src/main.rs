use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use redwatch::cli::{Cli, Command, HistoryCommand};
use redwatch::config::MonitorConfig;
use redwatch::error::Result;
use redwatch::monitor::PollingEngine;
use redwatch::output;
use redwatch::store::{Page, SnapshotStore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = redwatch::logging::init_logging(&config) {
        eprintln!("Warning: failed to initialize logging: {}", e);
        // Fall back to env_logger
        env_logger::init();
    }

    if let Err(e) = run(cli.command, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: MonitorConfig) -> Result<()> {
    match command {
        Command::Poll => {
            let store = Arc::new(SnapshotStore::open(&config.history_file)?);
            let engine = PollingEngine::new(config, store);
            let result = engine.poll_once().await;
            output::print_poll_result(&result);
        }
        Command::Watch => {
            let store = Arc::new(SnapshotStore::open(&config.history_file)?);
            let interval_secs = config.refresh_interval_secs;
            let engine = PollingEngine::new(config, store);

            loop {
                let result = engine.poll_once().await;
                output::print_poll_result(&result);

                if interval_secs == 0 {
                    break;
                }
                // shutdown lands between cycles, never mid-cycle
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("shutdown signal received");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
                }
            }
        }
        Command::History { what } => {
            let store = SnapshotStore::open(&config.history_file)?;
            match what {
                HistoryCommand::Nodes {
                    cluster,
                    page,
                    page_size,
                    csv,
                } => {
                    if csv {
                        let rows = store.query_node_history(cluster.as_deref(), None)?;
                        print!("{}", output::node_history_csv(&rows));
                    } else {
                        let page = Page::new(page_size, page);
                        let total = store.count_node_history(cluster.as_deref())?;
                        let rows = store.query_node_history(cluster.as_deref(), Some(page))?;
                        output::print_node_history(&rows, page, total, cluster.as_deref());
                    }
                }
                HistoryCommand::Sentinels {
                    page,
                    page_size,
                    csv,
                } => {
                    if csv {
                        let rows = store.query_sentinel_history(None)?;
                        print!("{}", output::sentinel_history_csv(&rows));
                    } else {
                        let page = Page::new(page_size, page);
                        let total = store.count_sentinel_history()?;
                        let rows = store.query_sentinel_history(Some(page))?;
                        output::print_sentinel_history(&rows, page, total);
                    }
                }
            }
        }
        Command::Clusters => {
            let store = SnapshotStore::open(&config.history_file)?;
            output::print_cluster_names(&store.cluster_names()?);
        }
    }
    Ok(())
}
