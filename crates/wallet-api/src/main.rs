use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use wallet_core::{AppContext, Config};

#[derive(Parser)]
#[command(name = "wallet-api", about = "HTTP API of the custodial wallet")]
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
    let listen = config.api.listen.clone();
    let ctx = Arc::new(AppContext::new(config)?);

    let app = wallet_api::router(ctx);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(%listen, "wallet api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
