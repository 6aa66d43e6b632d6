use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backup::{BackupError, BackupManager, JobStatus};
use crate::utils::log_buffer::LogEntry;

pub fn routes() -> Router<BackupManager> {
    Router::new()
        .route("/pack", post(start_pack))
        .route("/status", get(get_status))
        .route("/logs", get(get_logs))
        .route("/shutdown", post(shutdown))
}

#[derive(Debug, Deserialize)]
pub struct PackRequest {
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

impl IntoResponse for BackupError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_rejection() => StatusCode::BAD_REQUEST,
            BackupError::AlreadyRunning => StatusCode::CONFLICT,
            BackupError::NoServerHandle => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ActionResponse {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn start_pack(
    State(manager): State<BackupManager>,
    Json(request): Json<PackRequest>,
) -> Result<Json<ActionResponse>, BackupError> {
    let output_path = request.output_path.unwrap_or_default();

    match manager.start(&output_path, request.exclude).await {
        Ok(job_id) => {
            info!("Accepted backup into {} (job {})", output_path, job_id);
            Ok(ActionResponse::ok("Backup started..."))
        }
        Err(e) => {
            warn!("Rejected backup request: {}", e);
            Err(e)
        }
    }
}

pub async fn get_status(State(manager): State<BackupManager>) -> Json<JobStatus> {
    Json(manager.get_status())
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    limit: Option<usize>,
}

async fn get_logs(
    State(manager): State<BackupManager>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    Json(manager.get_logs(query.limit))
}

async fn shutdown(State(manager): State<BackupManager>) -> Result<Json<ActionResponse>, BackupError> {
    manager.request_shutdown()?;
    Ok(ActionResponse::ok("Server is shutting down..."))
}
