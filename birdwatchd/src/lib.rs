mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use birdwatch_core::{
    load_config, BirdwatchConfig, CollectionConfig, CollectionJob, CollectionScheduler,
    ExtractionEngine, FetchClient, PostArchive, SqlitePostStore,
};

pub use server::{router, AppState};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] birdwatch_core::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] birdwatch_core::StoreError),
    #[error("extraction setup error: {0}")]
    Extract(#[from] birdwatch_core::ExtractError),
    #[error("invalid bind address {address}: {source}")]
    BindAddress {
        address: String,
        source: std::net::AddrParseError,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracked-account post collection daemon", long_about = None)]
pub struct Cli {
    /// Path to birdwatch.toml
    #[arg(long, default_value = "configs/birdwatch.toml")]
    pub config: PathBuf,
    /// Override the posts database path
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Override the listening port
    #[arg(long)]
    pub port: Option<u16>,
    /// Start without the recurring collection schedule
    #[arg(long, default_value_t = false)]
    pub no_scheduler: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(database) = &cli.database {
        config.storage.database_path = database.display().to_string();
    }

    let store = build_store(&config)?;
    let archive: Arc<SqlitePostStore> = Arc::new(store);
    let job = Arc::new(build_job(&config, Arc::clone(&archive) as Arc<dyn PostArchive>)?);

    let scheduler_handle = if config.scheduler.enabled && !cli.no_scheduler {
        Some(CollectionScheduler::new(Arc::clone(&job), &config.scheduler).spawn())
    } else {
        info!("recurring collection disabled");
        None
    };

    let state = AppState {
        job,
        archive: archive as Arc<dyn PostArchive>,
    };
    let app = server::router(state);

    let raw_address = format!("{}:{}", config.server.bind_address, config.server.port);
    let address: SocketAddr = raw_address.parse().map_err(|source| AppError::BindAddress {
        address: raw_address.clone(),
        source,
    })?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler_handle {
        handle.stop().await;
    }
    Ok(())
}

fn build_store(config: &BirdwatchConfig) -> Result<SqlitePostStore> {
    if let Some(parent) = Path::new(&config.storage.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqlitePostStore::builder()
        .path(&config.storage.database_path)
        .create_if_missing(true)
        .build()?;
    store.initialize()?;

    let counts = store.count_by_username()?;
    info!(
        database = %config.storage.database_path,
        tracked_with_posts = counts.len(),
        stored_posts = counts.values().sum::<usize>(),
        "post store ready"
    );
    Ok(store)
}

fn build_job(config: &BirdwatchConfig, archive: Arc<dyn PostArchive>) -> Result<CollectionJob> {
    let fetcher = FetchClient::new(
        config.browser.clone(),
        config.scrape.profile_url_template.clone(),
        config.scrape.selectors.post_container.clone(),
    );
    let extractor = ExtractionEngine::new(&config.scrape.selectors)?;
    Ok(CollectionJob::new(
        Arc::new(fetcher),
        extractor,
        archive,
        CollectionConfig {
            accounts: config.scrape.accounts.clone(),
            account_delay_range_ms: (
                config.scrape.account_delay_range_ms[0],
                config.scrape.account_delay_range_ms[1],
            ),
        },
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install ctrl-c handler");
    }
}
