use axum::response::Html;

/// GET /: submission form (embedded at compile time).
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}
