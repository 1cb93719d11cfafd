use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BrowserSection;

use super::error::{FetchError, FetchResult};

/// Snapshot of a profile page at the moment the first post container appeared.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    pub html: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FetchClient {
    config: Arc<BrowserSection>,
    profile_url_template: String,
    post_container: String,
}

impl FetchClient {
    pub fn new(
        config: BrowserSection,
        profile_url_template: impl Into<String>,
        post_container: impl Into<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            profile_url_template: profile_url_template.into(),
            post_container: post_container.into(),
        }
    }

    pub fn profile_url(&self, username: &str) -> FetchResult<String> {
        let raw = self.profile_url_template.replace("{username}", username);
        let parsed = Url::parse(&raw).map_err(|err| {
            FetchError::Configuration(format!("invalid profile url {raw}: {err}"))
        })?;
        Ok(parsed.into())
    }

    /// Fetch one profile in a fresh Chromium instance. The navigate-and-wait
    /// sequence is bounded by the configured timeout; the instance is torn
    /// down whether the fetch succeeds, fails, or times out.
    pub async fn fetch(&self, username: &str) -> FetchResult<RenderedContent> {
        let url = self.profile_url(username)?;
        let deadline = Duration::from_secs(self.config.navigation_timeout_seconds);
        let session = self.launch().await?;
        let outcome = tokio::time::timeout(deadline, self.capture(&session, &url)).await;
        session.shutdown().await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url,
                elapsed: deadline,
            }),
        }
    }

    async fn launch(&self) -> FetchResult<BrowserSession> {
        let chromium_config = self.build_chromium_config()?;
        info!(
            headless = self.config.headless,
            width = self.config.window[0],
            height = self.config.window[1],
            "launching chromium instance"
        );
        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| FetchError::Launch(err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });
        Ok(BrowserSession {
            browser,
            handler_task: Some(handler_task),
        })
    }

    async fn capture(&self, session: &BrowserSession, url: &str) -> FetchResult<RenderedContent> {
        let page = session
            .browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        if let Some(agent) = &self.config.user_agent {
            let params = SetUserAgentOverrideParams::builder()
                .user_agent(agent.clone())
                .build()
                .map_err(FetchError::Configuration)?;
            page.set_user_agent(params).await?;
        }
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(FetchError::Configuration)?;
        page.goto(params).await?;
        page.wait_for_navigation().await?;
        self.wait_for_container(&page).await?;
        let html = page.content().await?;
        debug!(url = %url, bytes = html.len(), "captured rendered profile");
        Ok(RenderedContent {
            html,
            url: url.to_string(),
            fetched_at: Utc::now(),
        })
    }

    // Polls until the first post container exists. Unbounded on its own; the
    // caller's navigation timeout is the bound.
    async fn wait_for_container(&self, page: &Page) -> FetchResult<()> {
        let poll = Duration::from_millis(self.config.container_poll_interval_ms.max(50));
        loop {
            if page.find_element(self.post_container.as_str()).await.is_ok() {
                return Ok(());
            }
            sleep(poll).await;
        }
    }

    fn build_chromium_config(&self) -> FetchResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder();
        if let Some(path) = &self.config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        builder = builder.request_timeout(Duration::from_secs(
            self.config.navigation_timeout_seconds,
        ));

        let mut args = vec![format!(
            "--window-size={},{}",
            self.config.window[0], self.config.window[1]
        )];
        if let Some(agent) = &self.config.user_agent {
            args.push(format!("--user-agent={agent}"));
        }
        if self.config.disable_gpu {
            args.push("--disable-gpu".into());
        }
        args.push("--mute-audio".into());
        args.push("--no-first-run".into());
        args.push("--disable-background-timer-throttling".into());
        builder = builder.args(args);

        builder.build().map_err(FetchError::Configuration)
    }
}

#[derive(Debug)]
pub struct BrowserSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserSession {
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!("browser session dropped without explicit shutdown");
            }
        }
    }
}
