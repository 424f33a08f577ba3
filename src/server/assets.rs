//! Embedded dashboard page and its static files.

use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "web/"]
pub struct WebAssets;

/// Look up an embedded file by request path, with `/` meaning the dashboard.
fn lookup(path: &str) -> Option<(String, Vec<u8>)> {
    let name = match path.trim_start_matches('/') {
        "" => "index.html",
        other => other,
    };
    let file = WebAssets::get(name)?;
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    Some((mime.to_string(), file.data.into_owned()))
}

/// Fallback handler: embedded dashboard files, 404 for anything else.
pub async fn serve_embedded(uri: Uri) -> Response {
    match lookup(uri.path()) {
        Some((mime, bytes)) => ([(header::CONTENT_TYPE, mime)], bytes).into_response(),
        None => {
            tracing::debug!("No route or asset for {}", uri.path());
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
