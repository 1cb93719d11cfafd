use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::error;

use birdwatch_core::{CollectionJob, Post, PostArchive, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub job: Arc<CollectionJob>,
    pub archive: Arc<dyn PostArchive>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/tweets", get(collect_now))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs a full collection pass and answers with everything it scraped. The
/// batch is persisted as a side effect; per-account and per-post failures
/// have already been absorbed inside the job.
async fn collect_now(State(state): State<AppState>) -> Json<Vec<Post>> {
    let batch = state.job.run().await;
    Json(batch.posts)
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let posts = state.archive.list_all().await?;
    Ok(Html(render_page(&posts)))
}

struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

fn render_page(posts: &[Post]) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>birdwatch</title>\n</head>\n<body>\n",
    );
    page.push_str(&format!(
        "<h1>Collected posts ({})</h1>\n<ul>\n",
        posts.len()
    ));
    for post in posts {
        page.push_str("<li><strong>@");
        page.push_str(&escape_html(&post.username));
        page.push_str("</strong>");
        if !post.time.is_empty() {
            page.push_str(" <em>");
            page.push_str(&escape_html(&post.time));
            page.push_str("</em>");
        }
        page.push_str("<br>");
        page.push_str(&escape_html(&post.text));
        page.push_str("</li>\n");
    }
    page.push_str("</ul>\n</body>\n</html>\n");
    page
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
