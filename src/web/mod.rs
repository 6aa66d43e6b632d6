pub mod static_files;
pub mod websocket;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::backup::BackupManager;

/// The whole HTTP surface: JSON API, status websocket and the static UI.
pub fn app(manager: BackupManager) -> Router {
    let static_dir = manager.config().static_dir.clone();

    Router::new()
        .nest("/api", api::routes())
        .nest("/ws", websocket::routes())
        .merge(static_files::routes(&static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}
