#![warn(clippy::complexity)]

use ::reserve_snapshot::env::Env;
use ::reserve_snapshot::onchain::real::RealChain;
use ::reserve_snapshot::snapshot_reserves;
use tokio::sync::broadcast;
use tracing::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Env::init()?;
    let config = env.load_config().inspect_err(|err| {
        error!("Parse config failed: {err}");
    })?;
    let onchain = RealChain::from_config(&config)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received CTRL+C, shutting down");
                let _ = shutdown_tx.send(());
            }
            Err(err) => error!("Failed to listen for CTRL+C: {err}"),
        }
    });

    let summary =
        snapshot_reserves(&config, &onchain, chrono::Utc::now(), shutdown_rx)
            .await;
    info!(
        "Done: {} cycles, {} snapshots written, {} failed",
        summary.cycles, summary.snapshots, summary.failures
    );

    Ok(())
}
