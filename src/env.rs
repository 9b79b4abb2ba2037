//! A module for parsing the command line and environment variables and
//! initializing the [`Env`] struct.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::error::ConfigError;

pub const DEFAULT_LOG_LEVEL: u8 = 2;

/// Configuration options for the CLI tool.
///
/// The options can be set by environment variables or command line arguments.
#[derive(Debug, Parser)]
#[clap(about = "Snapshot market reserves on a schedule")]
pub struct Env {
    /// Log verbosity: 0 trace, 1 debug, 2 info, 3 warn, 4 and above error.
    #[clap(long, env, default_value_t = DEFAULT_LOG_LEVEL)]
    pub log_level: u8,

    /// The path to the JSON config file.
    #[clap(
        long = "config",
        env = "CONFIG_PATH",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config_path: PathBuf,

    /// When to take the first snapshot, in RFC 3339. Overrides the config.
    #[clap(long, env)]
    pub start_time: Option<DateTime<Utc>>,

    /// Directory to write snapshots to. Overrides the config.
    #[clap(long, env)]
    pub output_dir: Option<PathBuf>,

    /// Directory to also write logs to, one file per run. Logs only go to
    /// stdout when unset.
    #[clap(long, env)]
    pub log_dir: Option<PathBuf>,
}

impl Env {
    /// Read the configuration from the environment and set up logging.
    pub fn init() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let env = Env::parse();
        let log_level = env.tracing_level();
        let env_filter = format!("warn,reserve_snapshot={log_level}");

        let file_layer = match &env.log_dir {
            Some(log_dir) => {
                let file = open_log_file(log_dir, Utc::now())?;
                let layer =
                    fmt::layer().with_ansi(false).with_writer(Arc::new(file));
                Some(layer)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(EnvFilter::new(env_filter))
            .with(fmt::layer())
            .with(file_layer)
            .init();

        Ok(env)
    }

    pub fn tracing_level(&self) -> Level {
        match self.log_level {
            0 => Level::TRACE,
            1 => Level::DEBUG,
            2 => Level::INFO,
            3 => Level::WARN,
            _ => Level::ERROR,
        }
    }

    /// Load the config file and apply the command line overrides.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load(&self.config_path)?;

        if let Some(start_time) = self.start_time {
            config.snapshot_start = Some(start_time);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }

        Ok(config)
    }
}

/// Create `log_dir` if needed and open a fresh log file in it named after
/// `started_at`.
pub fn open_log_file(
    log_dir: &Path,
    started_at: DateTime<Utc>,
) -> std::io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    let name = format!("{}.log", started_at.format("%Y-%m-%d_%H.%M.%S"));

    OpenOptions::new().create(true).append(true).open(log_dir.join(name))
}
