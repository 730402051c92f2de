use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::prescriptions::PrescriptionRequest,
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_prescription_request))
}

#[utoipa::path(
    post,
    path = "/api/prescription-request",
    request_body = PrescriptionRequest,
    responses(
        (status = 201, description = "Request forwarded to the pharmacy"),
        (status = 400, description = "Validation failure"),
    ),
    tag = "Prescriptions"
)]
pub async fn submit_prescription_request(
    State(state): State<AppState>,
    Json(payload): Json<PrescriptionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("A name is required".into()));
    }
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::BadRequest("A contact email is required".into()));
    }
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("A message is required".into()));
    }

    // Nothing is persisted here: the admin email is the whole effect, so a
    // transport failure is surfaced instead of absorbed.
    state
        .notifier
        .prescription_request(
            &payload.name,
            &payload.email,
            payload.phone.as_deref(),
            &payload.message,
        )
        .await
        .map_err(|err| AppError::Internal(anyhow::anyhow!(err)))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Prescription request received",
            serde_json::json!({}),
            Some(Meta::empty()),
        )),
    ))
}
