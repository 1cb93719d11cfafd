mod client;
mod error;

pub use client::{BrowserSession, FetchClient, RenderedContent};
pub use error::{FetchError, FetchResult};
