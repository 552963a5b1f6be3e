use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use webchannel::{build_session, Config};

/// Round trip a message through the bridge and an in-process backend
#[derive(Debug, Parser)]
#[command(name = "webchannel", version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Message to send on the round trip
    #[arg(short, long, default_value = "Alert message passed through from the client to the backend and back!")]
    message: String,

    /// Seconds to wait for the backend to call back
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Also exercise the plugin callback op
    #[arg(long)]
    callback: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (silently ignore if not found)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // RUST_LOG wins over the configured filter
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let session = build_session(&config)?;

    tracing::info!("Plugins ({}):", session.bridge.plugin_names().len());
    for name in session.bridge.plugin_names() {
        tracing::info!("  - {}", name);
    }
    tracing::info!("Backend ops ({}):", session.backend.op_names().len());
    for op in session.backend.op_names() {
        tracing::info!("  - {}", op);
    }

    if args.callback {
        session.roundtrip.test_callback()?;
    }

    let received = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        session.run_roundtrip(&args.message),
    )
    .await
    .map_err(|_| anyhow::anyhow!("No reply from the backend within {}s", args.timeout))??;

    session.bridge.channel().flush().await;
    println!("{}", received);

    session.shutdown();
    Ok(())
}
