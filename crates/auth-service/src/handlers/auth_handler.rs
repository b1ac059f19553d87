use crate::errors::AuthError;
use crate::models::{RefreshRequest, RegisterRequest, RegisterResponse, TokenPairResponse};
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use uuid::Uuid;

fn parse_identity_id(raw: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AuthError::Validation("uuid is not a valid identifier".to_string()))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::Validation(rejection.body_text()))
}

/// Handle registration
///
/// POST /api/register
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let request = json_body(payload)?;

    let uuid = state.auth.register(&request.email).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { uuid })))
}

/// Handle token pair issuance
///
/// GET /api/createTokenPair/{uuid}
pub async fn handle_create_token_pair(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<TokenPairResponse>), AuthError> {
    let id = parse_identity_id(&raw_id)?;

    let pair = state.auth.issue_pair(id).await?;

    Ok((StatusCode::CREATED, Json(pair.into())))
}

/// Handle refresh rotation
///
/// POST /api/refreshToken
///
/// The identity is taken from the `uuid` body field, never from an access
/// token.
pub async fn handle_refresh_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPairResponse>), AuthError> {
    let request = json_body(payload)?;

    let refresh_token = request
        .refresh_token
        .ok_or_else(|| AuthError::Validation("refresh_token is required".to_string()))?;
    let raw_id = request
        .uuid
        .ok_or_else(|| AuthError::Validation("uuid is required".to_string()))?;
    let id = parse_identity_id(&raw_id)?;

    let pair = state
        .auth
        .rotate_pair(id, refresh_token.expose_secret())
        .await?;

    Ok((StatusCode::CREATED, Json(pair.into())))
}
