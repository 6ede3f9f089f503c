//! Logging setup.
//!
//! Redis-style log output behind the `log` facade: levels named the way
//! Redis names them (debug, verbose, notice, warning, nothing), lines
//! prefixed with pid and a level character, written to a file when one
//! is configured and to stderr otherwise.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

use crate::config::MonitorConfig;

/// Redis-style log levels mapped to Rust log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Nothing,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "notice" => Self::Notice,
            "warning" => Self::Warning,
            "nothing" => Self::Nothing,
            _ => Self::Notice, // Default
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::Debug,
            Self::Verbose => LevelFilter::Info,
            Self::Notice => LevelFilter::Info,
            Self::Warning => LevelFilter::Warn,
            Self::Nothing => LevelFilter::Off,
        }
    }
}

/// Logger writing Redis-style lines to a file or stderr.
pub struct MonitorLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl MonitorLogger {
    pub fn new(config: &MonitorConfig) -> Self {
        let level = LogLevel::from_str(&config.loglevel).to_level_filter();

        let file = if !config.logfile.is_empty() {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.logfile)
            {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to open log file '{}': {}",
                        config.logfile, e
                    );
                    None
                }
            }
        } else {
            None
        };

        Self { level, file }
    }

    fn format_record(&self, record: &Record) -> String {
        let now = chrono::Local::now().format("%d %b %Y %H:%M:%S%.3f");
        let level_char = match record.level() {
            log::Level::Error => '!',
            log::Level::Warn => '#',
            log::Level::Info => '*',
            log::Level::Debug => '-',
            log::Level::Trace => '.',
        };

        format!(
            "{}:{} {} {}\n",
            std::process::id(),
            level_char,
            now,
            record.args()
        )
    }
}

impl Log for MonitorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let formatted = self.format_record(record);

        if let Some(ref file) = self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.write_all(formatted.as_bytes());
            }
        } else {
            eprint!("{}", formatted);
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Initialize logging from monitor config.
/// This replaces env_logger::init()
pub fn init_logging(config: &MonitorConfig) -> Result<(), log::SetLoggerError> {
    let logger = Box::new(MonitorLogger::new(config));
    let level = LogLevel::from_str(&config.loglevel).to_level_filter();

    log::set_boxed_logger(logger)?;
    log::set_max_level(level);

    Ok(())
}
