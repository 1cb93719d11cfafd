use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use birdwatch_core::{
    CollectionConfig, CollectionJob, CollectionScheduler, ExtractionEngine, FetchError,
    FetchResult, Post, PostArchive, ProfileFetcher, RenderedContent, ScheduleSection,
    SelectorSection, StoreError, StoreResult,
};

fn extraction_engine() -> ExtractionEngine {
    ExtractionEngine::new(&SelectorSection {
        post_container: "article".into(),
        text_region: "[data-testid='tweet'] [lang]".into(),
        time_marker: "time".into(),
    })
    .unwrap()
}

fn profile_html(posts: &[(&str, Option<&str>)]) -> String {
    let mut html = String::from("<html><body>");
    for (text, time) in posts {
        html.push_str("<article><div data-testid=\"tweet\"><div lang=\"en\">");
        html.push_str(text);
        html.push_str("</div></div>");
        if let Some(time) = time {
            html.push_str("<time datetime=\"");
            html.push_str(time);
            html.push_str("\">stamp</time>");
        }
        html.push_str("</article>");
    }
    html.push_str("</body></html>");
    html
}

enum MockResponse {
    Page(String),
    Timeout,
    Broken,
}

struct MockFetcher {
    responses: HashMap<String, MockResponse>,
}

impl MockFetcher {
    fn new(responses: Vec<(&str, MockResponse)>) -> Arc<Self> {
        Arc::new(Self {
            responses: responses
                .into_iter()
                .map(|(name, response)| (name.to_string(), response))
                .collect(),
        })
    }
}

#[async_trait]
impl ProfileFetcher for MockFetcher {
    async fn fetch(&self, username: &str) -> FetchResult<RenderedContent> {
        let url = format!("https://twitter.com/{username}");
        match self.responses.get(username) {
            Some(MockResponse::Page(html)) => Ok(RenderedContent {
                html: html.clone(),
                url,
                fetched_at: Utc::now(),
            }),
            Some(MockResponse::Timeout) => Err(FetchError::Timeout {
                url,
                elapsed: Duration::from_secs(100),
            }),
            _ => Err(FetchError::Launch("chromium unavailable".into())),
        }
    }
}

#[derive(Default)]
struct MockArchive {
    appended: Mutex<Vec<Post>>,
    fail_on_text: Option<String>,
}

impl MockArchive {
    fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing_on(text: &str) -> Arc<Self> {
        Arc::new(Self {
            appended: Mutex::new(Vec::new()),
            fail_on_text: Some(text.to_string()),
        })
    }
}

#[async_trait]
impl PostArchive for MockArchive {
    async fn append(&self, post: &Post) -> StoreResult<()> {
        if self.fail_on_text.as_deref() == Some(post.text.as_str()) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.appended.lock().await.push(post.clone());
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<Post>> {
        Ok(self.appended.lock().await.clone())
    }
}

fn job(
    fetcher: Arc<MockFetcher>,
    archive: Arc<MockArchive>,
    accounts: &[&str],
) -> CollectionJob {
    CollectionJob::new(
        fetcher,
        extraction_engine(),
        archive,
        CollectionConfig {
            accounts: accounts.iter().map(|name| name.to_string()).collect(),
            account_delay_range_ms: (0, 0),
        },
    )
}

#[tokio::test]
async fn one_failing_account_does_not_abort_the_batch() {
    let fetcher = MockFetcher::new(vec![
        ("first", MockResponse::Page(profile_html(&[("alpha", None)]))),
        ("second", MockResponse::Broken),
        ("third", MockResponse::Page(profile_html(&[("gamma", None)]))),
    ]);
    let archive = MockArchive::accepting();
    let batch = job(fetcher, Arc::clone(&archive), &["first", "second", "third"])
        .run()
        .await;

    assert_eq!(batch.accounts_attempted, 3);
    assert_eq!(batch.accounts_failed, 1);
    assert_eq!(batch.posts.len(), 2);
    assert_eq!(batch.posts[0].username, "first");
    assert_eq!(batch.posts[1].username, "third");
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors[0].starts_with("second:"));
    assert_eq!(archive.list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn timeout_on_second_account_leaves_first_accounts_posts() {
    // Tracked list = [A, B]; A renders two containers, one without a time
    // marker; B times out.
    let fetcher = MockFetcher::new(vec![
        (
            "A",
            MockResponse::Page(profile_html(&[
                ("bridge exploit", Some("2023-04-11T08:30:00.000Z")),
                ("unconfirmed rumor", None),
            ])),
        ),
        ("B", MockResponse::Timeout),
    ]);
    let archive = MockArchive::accepting();
    let batch = job(fetcher, archive, &["A", "B"]).run().await;

    assert_eq!(batch.posts.len(), 2);
    assert!(batch.posts.iter().all(|post| post.username == "A"));
    assert_eq!(batch.posts[0].time, "2023-04-11T08:30:00.000Z");
    assert_eq!(batch.posts[1].time, "");
    assert_eq!(batch.accounts_failed, 1);
}

#[tokio::test]
async fn failed_append_keeps_post_in_batch_and_continues() {
    let fetcher = MockFetcher::new(vec![(
        "only",
        MockResponse::Page(profile_html(&[
            ("first post", None),
            ("poison post", None),
            ("third post", None),
        ])),
    )]);
    let archive = MockArchive::failing_on("poison post");
    let batch = job(fetcher, Arc::clone(&archive), &["only"]).run().await;

    assert_eq!(batch.posts.len(), 3);
    assert_eq!(batch.store_failures, 1);
    let stored = archive.list_all().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|post| post.text != "poison post"));
}

#[tokio::test(start_paused = true)]
async fn delay_between_accounts_accumulates() {
    let fetcher = MockFetcher::new(vec![
        ("one", MockResponse::Page(profile_html(&[("a", None)]))),
        ("two", MockResponse::Page(profile_html(&[("b", None)]))),
    ]);
    let archive = MockArchive::accepting();
    let job = CollectionJob::new(
        fetcher,
        extraction_engine(),
        archive,
        CollectionConfig {
            accounts: vec!["one".into(), "two".into()],
            account_delay_range_ms: (150, 150),
        },
    );

    let batch = job.run().await;
    assert_eq!(batch.total_wait_ms, 150);
    assert_eq!(batch.posts.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_job_on_interval_and_stops_cleanly() {
    let fetcher = MockFetcher::new(vec![(
        "only",
        MockResponse::Page(profile_html(&[("scheduled alert", None)])),
    )]);
    let archive = MockArchive::accepting();
    let job = Arc::new(job(fetcher, Arc::clone(&archive), &["only"]));
    let scheduler = CollectionScheduler::new(
        Arc::clone(&job),
        &ScheduleSection {
            enabled: true,
            interval_minutes: 1,
            job_timeout_minutes: 1,
        },
    );

    let handle = scheduler.spawn();
    // nothing before the first interval elapses
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(archive.list_all().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    tokio::task::yield_now().await;
    assert_eq!(archive.list_all().await.unwrap().len(), 1);

    handle.stop().await;
}
