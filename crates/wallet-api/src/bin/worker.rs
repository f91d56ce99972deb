use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use wallet_core::background::BackgroundProcessor;
use wallet_core::{AppContext, Config};

#[derive(Parser)]
#[command(
    name = "wallet-worker",
    about = "Block-triggered consolidation and autopayment worker"
)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "wallet.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let ctx = Arc::new(AppContext::new(config)?);

    tracing::info!(coins = ctx.registry.coins().len(), "background worker starting");
    let mut worker = BackgroundProcessor::new(ctx);
    worker.run().await;
    Ok(())
}
