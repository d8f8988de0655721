//! Access service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AccessError,
    models::{AdminCommandRequest, CodeRequest, IssueCodeRequest, ValidationResponse},
    scheduler::TriggerOutcome,
    state::AppState,
};

/// Create the router for the access service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/access-codes/:booking_id",
            post(issue_code).get(get_code).delete(revoke_code),
        )
        .route("/access-codes/:booking_id/validate", post(validate_code))
        .route("/access-codes/:booking_id/open_door", post(open_door))
        .route("/access-codes/:booking_id/close_door", post(close_door))
        .route("/access-codes/:booking_id/audit", get(audit_trail))
        .route("/locks/commands", post(send_lock_command))
        .route("/monitor/scan", post(trigger_scan))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match common::database::health_check(&state.db_pool).await {
        Ok(true) => "ok",
        Ok(false) => "unavailable",
        Err(e) => {
            error!("Database health check failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "access-service",
        "database": database
    }))
}

/// Issue a new authorization code for a booking
pub async fn issue_code(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<IssueCodeRequest>,
) -> Result<impl IntoResponse, AccessError> {
    let code = state
        .access_service
        .authority()
        .issue(booking_id, payload.valid_from, payload.valid_until)
        .await?;

    Ok((StatusCode::CREATED, Json(code)))
}

/// Get the current authorization code of a booking
pub async fn get_code(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AccessError> {
    let code = state.access_service.authority().get(booking_id).await?;
    Ok(Json(code))
}

/// Revoke the authorization code of a booking
pub async fn revoke_code(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AccessError> {
    let code = state.access_service.authority().revoke(booking_id).await?;
    Ok(Json(code))
}

/// Check a presented code against the booking's current code
pub async fn validate_code(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CodeRequest>,
) -> Result<impl IntoResponse, AccessError> {
    let is_valid = state
        .access_service
        .authority()
        .is_valid(booking_id, &payload.code, Utc::now())
        .await?;

    Ok(Json(ValidationResponse { is_valid }))
}

pub async fn open_door(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CodeRequest>,
) -> Result<impl IntoResponse, AccessError> {
    let result = state
        .access_service
        .open_door(booking_id, &payload.code)
        .await?;
    Ok(Json(result))
}

pub async fn close_door(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CodeRequest>,
) -> Result<impl IntoResponse, AccessError> {
    let result = state
        .access_service
        .close_door(booking_id, &payload.code)
        .await?;
    Ok(Json(result))
}

/// Audit entries of the booking's current code
pub async fn audit_trail(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AccessError> {
    let entries = state.access_service.audit_trail(booking_id).await?;
    Ok(Json(entries))
}

/// Send a command straight to a lock; audited without an authorization code
pub async fn send_lock_command(
    State(state): State<AppState>,
    Json(payload): Json<AdminCommandRequest>,
) -> Result<impl IntoResponse, AccessError> {
    let result = state
        .access_service
        .send_admin_command(&payload.lock_identifier, &payload.command)
        .await?;
    Ok(Json(result))
}

/// Start an anomaly scan in the background
pub async fn trigger_scan(State(state): State<AppState>) -> impl IntoResponse {
    let trigger = state.scan_trigger.clone();
    tokio::spawn(async move {
        if let TriggerOutcome::Completed(report) = trigger.fire().await {
            info!(
                scanned = report.scanned,
                notified = report.notified,
                skipped = report.skipped,
                "Manual anomaly scan finished"
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "policy": state.scan_trigger.policy().as_str()
        })),
    )
}
