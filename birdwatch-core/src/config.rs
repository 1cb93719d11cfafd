use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BirdwatchConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub browser: BrowserSection,
    pub scrape: ScrapeSection,
    pub scheduler: ScheduleSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub user_agent: Option<String>,
    pub window: [u32; 2],
    pub navigation_timeout_seconds: u64,
    pub container_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSection {
    pub accounts: Vec<String>,
    pub profile_url_template: String,
    pub account_delay_range_ms: [u64; 2],
    pub selectors: SelectorSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSection {
    pub post_container: String,
    pub text_region: String,
    pub time_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub job_timeout_minutes: u64,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BirdwatchConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
