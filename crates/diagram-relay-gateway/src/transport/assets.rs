//! Static diagram-viewer bundle.
//!
//! Served from `browser.assets_dir` on the same port as the WebSocket so the
//! page can open its socket against its own origin.

use std::path::{Path, PathBuf};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

pub async fn serve_asset(State(app): State<AppState>, uri: Uri) -> Response {
    let Some(root) = app.cfg().browser.assets_dir.as_deref() else {
        return (StatusCode::NOT_FOUND, "no asset bundle configured").into_response();
    };
    let Some(rel) = resolve_path(uri.path()) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };

    let path = Path::new(root).join(rel);
    match tokio::fs::read(&path).await {
        Ok(body) => ([(header::CONTENT_TYPE, content_type(&path))], body).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "asset read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "asset read failed").into_response()
        }
    }
}

/// Map a request path to a path relative to the bundle root.
/// `None` for anything that could escape the root.
pub fn resolve_path(uri_path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for comp in uri_path.split('/') {
        match comp {
            "" | "." => continue,
            ".." => return None,
            c if c.contains('\\') || c.contains(':') => return None,
            c => out.push(c),
        }
    }
    if out.as_os_str().is_empty() || uri_path.ends_with('/') {
        out.push("index.html");
    }
    Some(out)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("wasm") => "application/wasm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
