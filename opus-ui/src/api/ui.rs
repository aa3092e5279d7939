//! UI serving routes
//!
//! Serves the static HTML/JS pages. Assets are compiled into the binary;
//! there is no filesystem webroot to deploy.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

const INDEX_HTML: &str = include_str!("../ui/index.html");
const ADMIN_HTML: &str = include_str!("../ui/admin.html");
const APP_JS: &str = include_str!("../ui/app.js");
const PLAYER_JS: &str = include_str!("../ui/player.js");
const ADMIN_JS: &str = include_str!("../ui/admin.js");
const STYLE_CSS: &str = include_str!("../ui/style.css");

/// GET /
///
/// Serves the liked songs page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /admin
///
/// Serves the admin review page. The page itself is static; every API it
/// calls is admin-gated.
pub async fn serve_admin() -> Html<&'static str> {
    Html(ADMIN_HTML)
}

fn js_response(body: &'static str) -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/javascript")],
        body,
    )
        .into_response()
}

/// GET /static/app.js
pub async fn serve_app_js() -> Response {
    js_response(APP_JS)
}

/// GET /static/player.js
pub async fn serve_player_js() -> Response {
    js_response(PLAYER_JS)
}

/// GET /static/admin.js
pub async fn serve_admin_js() -> Response {
    js_response(ADMIN_JS)
}

/// GET /static/style.css
pub async fn serve_style_css() -> Response {
    (StatusCode::OK, [("content-type", "text/css")], STYLE_CSS).into_response()
}
