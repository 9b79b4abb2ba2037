//! A CLI tool for periodically snapshotting the total reserves of every
//! market behind a lending pool contract into timestamped files.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::*;

pub mod address;
pub mod codec;
pub mod config;
pub mod env;
pub mod error;
pub mod onchain;
pub mod reserves;
pub mod scheduler;

use config::Config;
use onchain::OnChain;
use scheduler::{RunSummary, Schedule, Scheduler};

/// Take reserve snapshots over the window configured in `config`, starting
/// from `now` if no start instant is configured.
pub async fn snapshot_reserves(
    config: &Config,
    onchain: &impl OnChain,
    now: DateTime<Utc>,
    shutdown: broadcast::Receiver<()>,
) -> RunSummary {
    let schedule = Schedule::from_config(config, now);
    debug!("Snapshot schedule: {schedule:?}");

    Scheduler::new(onchain, config, schedule).run(shutdown).await
}
