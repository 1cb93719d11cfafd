use serde::{Deserialize, Serialize};

/// A single collected post. Records are append-only: once a post lands in the
/// store it is never updated or deleted, and nothing stops the same on-page
/// post from being stored again on a later run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Body text, empty when the page had no matching text region.
    pub text: String,
    /// Timestamp exactly as the page's time marker carried it (ISO-8601 in
    /// practice), empty when the marker or its attribute was missing.
    pub time: String,
    /// The tracked account this post was collected under.
    pub username: String,
}

impl Post {
    pub fn new(
        text: impl Into<String>,
        time: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            time: time.into(),
            username: username.into(),
        }
    }
}
