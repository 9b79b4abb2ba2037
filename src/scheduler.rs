//! Timed polling of the reserve aggregation.
//!
//! The scheduler sleeps until the start instant, then runs one snapshot cycle
//! per tick of the scan interval. A cycle that fails is logged and skipped.
//! After the first cycle captured at or past the end instant the scheduler
//! stops.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::*;

use crate::config::Config;
use crate::error::CycleError;
use crate::onchain::OnChain;
use crate::reserves::{total_reserve, Reserves};

/// When to poll and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Duration,
}

impl Schedule {
    /// Build the schedule from the config, starting at `now` when no start
    /// instant is configured.
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Self {
        let start = config.snapshot_start.unwrap_or(now);
        let end = start
            .checked_add_signed(config.snapshot_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { start, end, interval: config.scan_interval }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Polling,
    Done,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub snapshots: usize,
    pub failures: usize,
    pub cancelled: bool,
}

/// Wall clock derived from tokio's monotonic clock so that timestamps follow
/// the same timeline as the timers, paused test clocks included.
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self { wall: Utc::now(), mono: Instant::now() }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// Resolves once a shutdown is requested. A closed channel can never request
/// one, so it never resolves.
async fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending().await,
    }
}

/// File name of the snapshot captured at `taken_at`.
pub fn snapshot_file_name(taken_at: DateTime<Utc>) -> String {
    taken_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write `reserves` as `name<TAB>balance` lines into a new file under `dir`
/// named after `taken_at`. The file only appears once it is complete.
pub fn write_snapshot(
    dir: &Path,
    taken_at: DateTime<Utc>,
    reserves: &Reserves,
) -> Result<PathBuf, CycleError> {
    let name = snapshot_file_name(taken_at);
    let path = dir.join(&name);
    let partial = dir.join(format!("{name}.tmp"));

    std::fs::create_dir_all(dir)
        .map_err(|source| CycleError::Io { path: path.clone(), source })?;

    let written = write_records(&partial, reserves).and_then(|()| {
        std::fs::rename(&partial, &path)
            .map_err(|source| CycleError::Io { path: path.clone(), source })
    });
    if written.is_err() {
        let _ = std::fs::remove_file(&partial);
    }

    written.map(|()| path)
}

fn write_records(path: &Path, reserves: &Reserves) -> Result<(), CycleError> {
    let io_err = |source| CycleError::Io { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_err)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(file);

    for (name, balance) in reserves {
        writer.write_record([name, balance]).map_err(|source| {
            CycleError::Csv { path: path.to_path_buf(), source }
        })?;
    }
    writer.flush().map_err(io_err)?;

    Ok(())
}

/// Runs snapshot cycles against a chain according to a [`Schedule`].
pub struct Scheduler<'a, C> {
    onchain: &'a C,
    config: &'a Config,
    schedule: Schedule,
}

impl<'a, C: OnChain> Scheduler<'a, C> {
    pub fn new(onchain: &'a C, config: &'a Config, schedule: Schedule) -> Self {
        Self { onchain, config, schedule }
    }

    /// Wait for the start instant, poll until the end instant and report
    /// what happened. Returns early once `shutdown` fires.
    pub async fn run(
        &self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> RunSummary {
        let clock = Clock::start();
        let mut summary = RunSummary::default();
        let Schedule { start, end, interval } = self.schedule.clone();

        let mut phase = Phase::Waiting;
        info!(
            "{phase:?}: snapshots run from {start} to {end} every {interval:?}"
        );

        let wait = (start - clock.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested before the snapshot start");
                summary.cancelled = true;
                return summary;
            }
        }

        phase = Phase::Polling;
        info!("{phase:?}: snapshot start: {}", clock.now());

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_requested(&mut shutdown) => {
                    summary.cancelled = true;
                    break;
                }
            }

            let taken_at = clock.now();
            summary.cycles += 1;

            tokio::select! {
                result = self.run_cycle(taken_at) => match result {
                    Ok(path) => {
                        summary.snapshots += 1;
                        info!("Wrote snapshot {}", path.display());
                    }
                    Err(err) => {
                        summary.failures += 1;
                        error!("Snapshot at {taken_at} failed: {err}");
                    }
                },
                _ = shutdown_requested(&mut shutdown) => {
                    summary.cancelled = true;
                    break;
                }
            }

            if taken_at >= end {
                break;
            }
        }

        if summary.cancelled {
            info!("Shutdown requested, stopping snapshots");
        }
        phase = Phase::Done;
        info!("{phase:?}: {summary:?}");

        summary
    }

    /// Aggregate the reserves and persist them. Nothing is written when the
    /// aggregation fails.
    async fn run_cycle(
        &self,
        taken_at: DateTime<Utc>,
    ) -> Result<PathBuf, CycleError> {
        let reserves = total_reserve(
            self.onchain,
            self.config.flash_pool_address,
            &self.config.asset_map,
        )
        .await?;
        debug!("Collected {} reserves at {taken_at}", reserves.len());

        write_snapshot(&self.config.output_dir, taken_at, &reserves)
    }
}
