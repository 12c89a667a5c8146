//! Browser-facing upload page.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// `GET /` — static upload form; it talks to the JSON API from the browser.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
