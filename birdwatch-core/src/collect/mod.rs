mod scheduler;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{FetchClient, FetchResult, RenderedContent};
use crate::extract::ExtractionEngine;
use crate::post::{Post, SqlitePostStore, StoreError, StoreResult};

pub use scheduler::{CollectionScheduler, SchedulerHandle};

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub accounts: Vec<String>,
    pub account_delay_range_ms: (u64, u64),
}

/// What one collection run produced. `posts` holds every extracted post,
/// including those whose store append failed; the counters and `errors` feed
/// logs rather than callers.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CollectionBatch {
    pub posts: Vec<Post>,
    pub accounts_attempted: usize,
    pub accounts_failed: usize,
    pub store_failures: usize,
    pub total_wait_ms: u64,
    pub duration_secs: u64,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch(&self, username: &str) -> FetchResult<RenderedContent>;
}

#[async_trait]
impl ProfileFetcher for FetchClient {
    async fn fetch(&self, username: &str) -> FetchResult<RenderedContent> {
        FetchClient::fetch(self, username).await
    }
}

#[async_trait]
pub trait PostArchive: Send + Sync {
    async fn append(&self, post: &Post) -> StoreResult<()>;
    async fn list_all(&self) -> StoreResult<Vec<Post>>;
}

#[async_trait]
impl PostArchive for SqlitePostStore {
    async fn append(&self, post: &Post) -> StoreResult<()> {
        let store = self.clone();
        let post = post.clone();
        tokio::task::spawn_blocking(move || store.append(&post))
            .await
            .map_err(|err| StoreError::Io(std::io::Error::other(err)))?
    }

    async fn list_all(&self) -> StoreResult<Vec<Post>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_all())
            .await
            .map_err(|err| StoreError::Io(std::io::Error::other(err)))?
    }
}

/// Walks the tracked-account list: fetch, extract, append. One account's
/// failure never aborts the batch, and a failed append never stops the
/// remaining posts or accounts.
pub struct CollectionJob {
    fetcher: Arc<dyn ProfileFetcher>,
    extractor: ExtractionEngine,
    archive: Arc<dyn PostArchive>,
    config: CollectionConfig,
}

impl CollectionJob {
    pub fn new(
        fetcher: Arc<dyn ProfileFetcher>,
        extractor: ExtractionEngine,
        archive: Arc<dyn PostArchive>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            archive,
            config,
        }
    }

    pub fn accounts(&self) -> &[String] {
        &self.config.accounts
    }

    pub async fn run(&self) -> CollectionBatch {
        let start = Instant::now();
        let mut batch = CollectionBatch::default();

        for (index, account) in self.config.accounts.iter().enumerate() {
            if index > 0 {
                batch.total_wait_ms += self.pause_between_accounts().await;
            }
            batch.accounts_attempted += 1;

            let content = match self.fetcher.fetch(account).await {
                Ok(content) => content,
                Err(err) => {
                    batch.accounts_failed += 1;
                    batch.errors.push(format!("{account}: {err}"));
                    if err.is_timeout() {
                        warn!(username = %account, error = %err, "profile fetch timed out");
                    } else {
                        warn!(username = %account, error = %err, "profile fetch failed");
                    }
                    continue;
                }
            };

            let posts = self.extractor.extract(&content, account);
            debug!(username = %account, posts = posts.len(), "profile extracted");

            for post in posts {
                if let Err(err) = self.archive.append(&post).await {
                    batch.store_failures += 1;
                    warn!(username = %account, error = %err, "post append failed");
                }
                batch.posts.push(post);
            }
        }

        batch.duration_secs = start.elapsed().as_secs();
        info!(
            posts = batch.posts.len(),
            attempted = batch.accounts_attempted,
            failed = batch.accounts_failed,
            store_failures = batch.store_failures,
            duration = batch.duration_secs,
            "collection run finished"
        );
        batch
    }

    async fn pause_between_accounts(&self) -> u64 {
        let (a, b) = self.config.account_delay_range_ms;
        if a == 0 && b == 0 {
            return 0;
        }
        let delay = {
            let mut rng = rand::thread_rng();
            rng.gen_range(a.min(b)..=a.max(b))
        };
        sleep(Duration::from_millis(delay)).await;
        delay
    }
}
