use crate::server::{DispatchError, Dispatcher};
use crate::{JobId, JobRequest, Status};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/start-chat", post(start_chat))
        .route("/what-is-this-mushroom", post(identify_image))
        .route("/chat-result/:job_id", get(chat_result))
        .with_state(dispatcher)
}

#[derive(Debug)]
pub enum ApiError {
    Validation(&'static str),
    NotFound,
    Unavailable(DispatchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Job not found".to_string()),
            ApiError::Unavailable(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        };
        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Unavailable(err)
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct StartChatRequest {
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct IdentifyImageRequest {
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: JobId,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobResultResponse {
    Pending,
    Complete { response: String },
    Failed { response: String },
}

async fn start_chat(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<StartChatRequest>, JsonRejection>,
) -> Result<Json<JobCreatedResponse>, ApiError> {
    const MISSING: &str = r#"A "message" field is required."#;
    let Json(req) = body.map_err(|_| ApiError::Validation(MISSING))?;
    let message = req.message.ok_or(ApiError::Validation(MISSING))?;

    let job_id = dispatcher.submit(JobRequest::Chat { message })?;
    info!(message = "New chat job", job_id = %job_id);
    Ok(Json(JobCreatedResponse { job_id }))
}

async fn identify_image(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<IdentifyImageRequest>, JsonRejection>,
) -> Result<Json<JobCreatedResponse>, ApiError> {
    const MISSING: &str = r#"An "image" field with base64 data is required."#;
    let Json(req) = body.map_err(|_| ApiError::Validation(MISSING))?;
    let image = req.image.ok_or(ApiError::Validation(MISSING))?;

    let job_id = dispatcher.submit(JobRequest::IdentifyImage { image })?;
    info!(message = "New image identification job", job_id = %job_id);
    Ok(Json(JobCreatedResponse { job_id }))
}

async fn chat_result(
    State(dispatcher): State<Dispatcher>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResultResponse>, ApiError> {
    debug!(message = "Polling request", job_id = %job_id);
    let id: JobId = job_id.parse().map_err(|_| ApiError::NotFound)?;
    let job = dispatcher.store().get(&id).ok_or(ApiError::NotFound)?;

    let response = match (job.status, job.result) {
        (Status::Complete, Some(response)) => JobResultResponse::Complete { response },
        (Status::Failed, Some(response)) => JobResultResponse::Failed { response },
        _ => JobResultResponse::Pending,
    };
    Ok(Json(response))
}
