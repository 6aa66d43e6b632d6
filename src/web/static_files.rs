use axum::{http::StatusCode, routing::get_service, Router};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Serve the UI from `dir`, with `index.html` for unknown paths.
pub fn routes<S>(dir: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let service = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));

    Router::new().fallback_service(get_service(service).handle_error(|_| async {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }))
}
