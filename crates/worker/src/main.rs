use anyhow::{Context, Result};
use jobd_daemon::DaemonConfig;
use jobd_worker::{build_daemon, StatusSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the filter so RUST_LOG can come from it
    let dotenv = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobd_worker=info,jobd_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = dotenv {
        tracing::info!("Loaded .env from {:?}", path);
    }

    let settings = StatusSettings::from_env();

    // One context unless JOBD_THREADS says otherwise
    let mut config = DaemonConfig::from_env().with_signal_handling(true);
    if std::env::var("JOBD_THREADS").is_err() {
        config = config.with_threads(1);
    }

    tracing::info!(
        url = %settings.url,
        interval_secs = settings.interval.as_secs(),
        threads = config.threads,
        daemon_id = %config.daemon_id,
        "Starting status daemon"
    );

    let daemon = build_daemon(&settings, config).context("Failed to build status daemon")?;
    daemon.start().await.context("Status daemon failed")?;

    tracing::info!("Status daemon shutdown complete");
    Ok(())
}
