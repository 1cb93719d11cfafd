use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,birdwatchd=debug,birdwatch_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = birdwatchd::Cli::parse();
    if let Err(err) = birdwatchd::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
