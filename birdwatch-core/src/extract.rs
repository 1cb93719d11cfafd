use scraper::{Html, Selector};
use thiserror::Error;

use crate::browser::RenderedContent;
use crate::config::SelectorSection;
use crate::post::Post;

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

/// Turns a rendered profile snapshot into post records. Selector problems
/// surface at construction; extraction itself cannot fail — missing page
/// elements degrade to empty fields.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    post_container: Selector,
    text_region: Selector,
    time_marker: Selector,
}

impl ExtractionEngine {
    pub fn new(selectors: &SelectorSection) -> ExtractResult<Self> {
        Ok(Self {
            post_container: parse_selector(&selectors.post_container)?,
            text_region: parse_selector(&selectors.text_region)?,
            time_marker: parse_selector(&selectors.time_marker)?,
        })
    }

    /// One `Post` per container match, in document order. The author is always
    /// the queried account, never whatever the page itself attributes.
    pub fn extract(&self, content: &RenderedContent, username: &str) -> Vec<Post> {
        let document = Html::parse_document(&content.html);
        document
            .select(&self.post_container)
            .map(|container| {
                let text = container
                    .select(&self.text_region)
                    .next()
                    .map(|element| collapse_text(element.text()))
                    .unwrap_or_default();
                let time = container
                    .select(&self.time_marker)
                    .next()
                    .and_then(|element| element.value().attr("datetime"))
                    .unwrap_or_default()
                    .to_string();
                Post {
                    text,
                    time,
                    username: username.to_string(),
                }
            })
            .collect()
    }
}

fn parse_selector(raw: &str) -> ExtractResult<Selector> {
    Selector::parse(raw).map_err(|err| ExtractError::Selector {
        selector: raw.to_string(),
        message: err.to_string(),
    })
}

// Joins an element's text nodes the way a rendered page reads: runs of
// whitespace become single spaces.
fn collapse_text<'a>(fragments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in fragments.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
