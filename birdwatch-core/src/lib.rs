pub mod browser;
pub mod collect;
pub mod config;
pub mod error;
pub mod extract;
pub mod post;
mod sqlite;

pub use browser::{FetchClient, FetchError, FetchResult, RenderedContent};
pub use collect::{
    CollectionBatch, CollectionConfig, CollectionJob, CollectionScheduler, PostArchive,
    ProfileFetcher, SchedulerHandle,
};
pub use config::{
    load_config, BirdwatchConfig, BrowserSection, ScheduleSection, ScrapeSection, SelectorSection,
    ServerSection, StorageSection,
};
pub use error::{ConfigError, Result};
pub use extract::{ExtractError, ExtractResult, ExtractionEngine};
pub use post::{Post, SqlitePostStore, SqlitePostStoreBuilder, StoreError, StoreResult};
