use bt_monitor::accumulator::ChannelAccumulator;
use bt_monitor::app_config::AppConfig;
use bt_monitor::domain::events::Event;
use bt_monitor::fleet::Fleet;
use bt_monitor::listener::listen;
use bt_monitor::runner;
use tokio::sync::mpsc;
use tokio::{signal, task};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!("✅  Loaded configuration");

    let fleet = Fleet::new(config.broadcast_tools())?;

    let (tx, rx) = mpsc::channel::<Event>(config.core().event_buffer_size());
    let accumulator = ChannelAccumulator::new(tx);
    let listener = task::spawn(listen(rx));
    info!("✅  Initialized listener");

    info!(
        "🔥 {} is up and running, polling {} device(s) every {:?}",
        env!("CARGO_PKG_NAME"),
        config.broadcast_tools().servers().len(),
        config.core().interval()
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Unable to listen for Ctrl-C, shutting down: {}", e);
        }
    };
    runner::run(fleet, &accumulator, config.core().interval(), shutdown).await;

    drop(accumulator);
    let received = listener.await?;
    info!("👋 Stopped after {} event(s)", received);

    Ok(())
}
