mod config;
mod main_lib;

use config::Config;
use main_lib::{build_state, init_tracing};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    let (sweep_stop, sweep_rx) = watch::channel(false);
    let sweeper = state
        .service
        .cache()
        .spawn_sweeper(config.cache_sweep_interval, sweep_rx);
    state.scheduler.start()?;
    tracing::info!("Cryptofolio daemon running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    state.scheduler.stop().await?;
    let _ = sweep_stop.send(true);
    sweeper.await?;
    state.service.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
