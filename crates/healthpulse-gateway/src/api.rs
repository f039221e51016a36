use axum::Json;
use axum::extract::{Path, State};
use healthpulse_common::{ChatMessage, HealthRecord, User};
use healthpulse_security::{hash_password, issue_token, verify_password};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// GET /api/ping — unauthenticated liveness probe.
pub async fn ping() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "healthpulse",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/auth/register — create an account and hand back a token.
pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if body.password.is_empty() {
        return Err(ApiError::BadRequest("a password is required".to_string()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state.health.lock().unwrap().create_user(
        body.email.trim(),
        body.name.as_deref(),
        &password_hash,
    )?;
    info!(user_id = user.id, "registered new user");

    let token = issue_token(user.id, &state.jwt_secret, state.config.auth.token_ttl_hours)?;
    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login — verify credentials and issue a token.
pub async fn login(
    State(state): State<SharedState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let found = state
        .health
        .lock()
        .unwrap()
        .user_with_password(body.email.trim())?;
    let Some((user, stored_hash)) = found else {
        return Err(ApiError::NotFound("user not found".to_string()));
    };

    if !verify_password(&body.password, &stored_hash) {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = issue_token(user.id, &state.jwt_secret, state.config.auth.token_ttl_hours)?;
    Ok(Json(AuthResponse { token, user }))
}

#[derive(Debug, Deserialize)]
pub struct AddRecordRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// GET /api/health — the caller's measurements, newest first.
pub async fn list_records(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<HealthRecord>>> {
    let records = state.health.lock().unwrap().list_records(user_id)?;
    Ok(Json(records))
}

/// POST /api/health — record one measurement for the caller.
pub async fn add_record(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AddRecordRequest>,
) -> ApiResult<Json<HealthRecord>> {
    if body.kind.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "a measurement type is required".to_string(),
        ));
    }

    let record = state.health.lock().unwrap().add_record(
        user_id,
        body.kind.trim(),
        body.value,
        body.unit.as_deref(),
    )?;
    Ok(Json(record))
}

/// DELETE /api/health/{id} — remove one of the caller's measurements.
pub async fn delete_record(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
    Path(record_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let deleted = state
        .health
        .lock()
        .unwrap()
        .delete_record(user_id, record_id)?;
    if !deleted {
        return Err(ApiError::NotFound("measurement not found".to_string()));
    }
    Ok(Json(json!({ "message": "measurement deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// GET /api/history — the caller's conversation, chronologically ascending.
pub async fn get_history(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = state.chat.lock().unwrap().list_messages(user_id)?;
    Ok(Json(messages))
}

/// POST /api/history — run the full pipeline for one turn and return the
/// newly persisted user/assistant pair.
pub async fn post_history(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<SendMessageRequest>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }

    let (question, answer) = state.pipeline.process_turn(user_id, content).await?;
    Ok(Json(vec![question, answer]))
}

/// DELETE /api/history — unconditionally clear the caller's conversation.
pub async fn delete_history(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Value>> {
    let deleted = state.chat.lock().unwrap().clear_messages(user_id)?;
    info!(user_id, deleted, "cleared chat history");
    Ok(Json(json!({ "message": "history cleared", "deleted": deleted })))
}
