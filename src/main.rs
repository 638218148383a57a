use tournament_settlement::{bootstrap, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tournament_settlement=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting Tournament Payout Settlement Service");

    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    let app = bootstrap::initialize_app(&config).await?;

    let handles = app.scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown signal received, stopping settlement jobs");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
