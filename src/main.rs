use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vecstore::api;
use vecstore::Config;

/// In-memory vector database server.
#[derive(Parser)]
#[command(name = "vecstore", version, about)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env();

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new(vecstore::constants::DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        data_dir = %config.data_dir.display(),
        default_index = %config.default_index,
        default_metric = %config.default_metric,
        "🔍 starting vecstore"
    );

    let state = api::build_state(&config).context("failed to initialize services")?;
    let router = api::router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("✅ listening on http://{addr}");

    axum::serve(listener, router)
        .await
        .context("server terminated")?;
    Ok(())
}
