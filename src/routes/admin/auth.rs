use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{
    dummy_password_hash, hash_password, issue_session, verify_password, AdminAuthUser, TokenKind,
};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::admins::Admin;
use crate::store::StoreError;
use crate::validation::{is_valid_email, validate_password};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(auth_status))
        .route("/setup", post(setup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminProfile {
    id: String,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminAuthResponse {
    token: String,
    expires_at: DateTime<Utc>,
    admin: AdminProfile,
}

fn sign_in(state: &AppState, admin: Admin) -> Result<AdminAuthResponse, AppError> {
    let (token, expires_at) = issue_session(state, &admin.id, TokenKind::Admin)?;
    Ok(AdminAuthResponse {
        token,
        expires_at,
        admin: AdminProfile {
            id: admin.id,
            email: admin.email,
        },
    })
}

async fn auth_status(State(state): State<AppState>) -> Result<Response, AppError> {
    let initialized = state.store().any_admin_exists()?;
    Ok(ok(serde_json::json!({ "initialized": initialized })).into_response())
}

/// 仅在尚无管理员时可用，用于初始化首个管理员账号。
async fn setup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Response, AppError> {
    if state.store().any_admin_exists()? {
        return Err(AppError::conflict(
            "ADMIN_ALREADY_EXISTS",
            "Admin account already exists",
        ));
    }
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("ADMIN_INVALID_EMAIL", "Invalid email format"));
    }
    validate_password(&req.password)
        .map_err(|msg| AppError::bad_request("ADMIN_WEAK_PASSWORD", msg))?;

    let admin = Admin::new(&email, hash_password(&req.password)?);
    match state.store().create_admin(&admin) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Err(AppError::conflict(
                "ADMIN_ALREADY_EXISTS",
                "Admin account already exists",
            ));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(admin_id = %admin.id, "Initial admin created");
    Ok(created(sign_in(&state, admin)?).into_response())
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Response, AppError> {
    let admin = state
        .store()
        .get_admin_by_email(&req.email.trim().to_lowercase())?;
    let hash = admin
        .as_ref()
        .map_or(dummy_password_hash(), |a| a.password_hash.as_str());
    let verified = verify_password(&req.password, hash)?;

    match admin {
        Some(admin) if verified => Ok(ok(sign_in(&state, admin)?).into_response()),
        _ => Err(AppError::unauthorized("Invalid email or password")),
    }
}

async fn logout(
    State(state): State<AppState>,
    admin: AdminAuthUser,
) -> Result<Response, AppError> {
    state.store().delete_admin_session(&admin.token_hash)?;
    Ok(ok(serde_json::json!({ "loggedOut": true })).into_response())
}
