use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{
    dummy_password_hash, hash_password, issue_session, verify_password, AuthUser, TokenKind,
};
use crate::constants::MAX_SESSIONS_PER_USER;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::users::User;
use crate::store::StoreError;
use crate::validation::{is_valid_email, validate_password, validate_username};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            email: value.email.clone(),
            username: value.username.clone(),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

fn start_session(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let (token, expires_at) = issue_session(state, &user.id, TokenKind::User)?;
    if let Err(e) = state
        .store()
        .trim_user_sessions(&user.id, MAX_SESSIONS_PER_USER)
    {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to trim old sessions");
    }
    Ok(AuthResponse {
        token,
        expires_at,
        user: UserProfile::from(user),
    })
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim();
    if !is_valid_email(email) {
        return Err(AppError::bad_request("AUTH_INVALID_EMAIL", "邮箱格式无效"));
    }
    validate_username(req.username.trim())
        .map_err(|msg| AppError::bad_request("AUTH_INVALID_USERNAME", msg))?;
    validate_password(&req.password)
        .map_err(|msg| AppError::bad_request("AUTH_WEAK_PASSWORD", msg))?;

    let user = User::new(email, &req.username, hash_password(&req.password)?);
    match state.store().create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Err(AppError::conflict("AUTH_EMAIL_TAKEN", "该邮箱已被注册"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, "User registered");
    Ok(created(start_session(&state, &user)?).into_response())
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state.store().get_user_by_email(req.email.trim())?;
    let hash = user
        .as_ref()
        .map_or(dummy_password_hash(), |u| u.password_hash.as_str());
    let verified = verify_password(&req.password, hash)?;

    match user {
        Some(user) if verified => Ok(ok(start_session(&state, &user)?).into_response()),
        _ => Err(AppError::unauthorized("邮箱或密码错误")),
    }
}

async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    state.store().delete_session(&auth.token_hash)?;
    Ok(ok(serde_json::json!({ "loggedOut": true })).into_response())
}
