use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::response::AppError;
use crate::state::AppState;
use crate::store::operations::sessions::AuthSession;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|v| v.to_string())
        .map_err(|e| AppError::internal(&format!("password hash failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(&format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 账号不存在时也做一次校验，避免通过响应时间探测邮箱是否注册。
pub fn dummy_password_hash() -> &'static str {
    "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0ZHVtbXk$YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXoxMjM0NTY"
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub fn sign_jwt(
    subject_id: &str,
    kind: TokenKind,
    secret: &str,
    expires_in_hours: u64,
) -> Result<(String, DateTime<Utc>), AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(expires_in_hours as i64);
    let claims = Claims {
        sub: subject_id.to_string(),
        kind,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(&format!("jwt sign failed: {e}")))?;
    Ok((token, expires_at))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

/// 签发 token 并登记会话，返回 (token, 过期时间)。
pub fn issue_session(
    state: &AppState,
    subject_id: &str,
    kind: TokenKind,
) -> Result<(String, DateTime<Utc>), AppError> {
    let config = state.config();
    let secret = match kind {
        TokenKind::User => &config.jwt_secret,
        TokenKind::Admin => &config.admin_jwt_secret,
    };
    let (token, expires_at) = sign_jwt(subject_id, kind, secret, config.jwt_expires_in_hours)?;
    let session = AuthSession {
        token_hash: hash_token(&token),
        user_id: subject_id.to_string(),
        created_at: Utc::now(),
        expires_at,
    };
    match kind {
        TokenKind::User => state.store().create_session(&session)?,
        TokenKind::Admin => state.store().create_admin_session(&session)?,
    }
    Ok((token, expires_at))
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

/// 已登录用户身份，由处理函数显式接收。
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub token_hash: String,
}

#[derive(Debug, Clone)]
pub struct AdminAuthUser {
    pub admin_id: String,
    pub token_hash: String,
}

fn authenticate(
    app_state: &AppState,
    parts: &Parts,
    kind: TokenKind,
) -> Result<(String, String), AppError> {
    let config = app_state.config();
    let secret = match kind {
        TokenKind::User => &config.jwt_secret,
        TokenKind::Admin => &config.admin_jwt_secret,
    };
    let token = extract_token_from_headers(&parts.headers)?;
    let claims = verify_jwt(&token, secret)?;
    if claims.kind != kind {
        return Err(AppError::unauthorized("Invalid token type"));
    }

    let token_hash = hash_token(&token);
    let session = match kind {
        TokenKind::User => app_state.store().get_session(&token_hash)?,
        TokenKind::Admin => app_state.store().get_admin_session(&token_hash)?,
    }
    .ok_or_else(|| AppError::unauthorized("Session not found or expired"))?;

    if session.user_id != claims.sub {
        return Err(AppError::unauthorized("Session mismatch"));
    }
    Ok((claims.sub, token_hash))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let (user_id, token_hash) = authenticate(&app_state, parts, TokenKind::User)?;
        if app_state.store().get_user_by_id(&user_id)?.is_none() {
            return Err(AppError::unauthorized("User not found"));
        }
        Ok(AuthUser {
            user_id,
            token_hash,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminAuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let (admin_id, token_hash) = authenticate(&app_state, parts, TokenKind::Admin)?;
        Ok(AdminAuthUser {
            admin_id,
            token_hash,
        })
    }
}
