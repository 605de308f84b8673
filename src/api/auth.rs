//! Registration, login and session auth.
//!
//! Passwords are hashed with Argon2. Session tokens are opaque random values;
//! only their sha256 hash is stored. Handlers downstream consume the verified
//! identity through the `User` extractor and never see credentials.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::{LoginRequest, LoginResponse, RegisterRequest, Session, User, UserResponse};
use crate::AppState;

use super::error::ApiError;
use super::validation::{validate_email, validate_name, validate_password, validate_phone};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session row and return the raw token.
pub async fn create_session(
    pool: &crate::DbPool,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(ttl_days)).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Register a new account
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    validate_name(&request.name).map_err(ApiError::validation)?;
    validate_email(&request.email).map_err(ApiError::validation)?;
    validate_password(&request.password).map_err(ApiError::validation)?;
    validate_phone(&request.phone).map_err(ApiError::validation)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, phone, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.phone)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(email = %request.email, "User registered");

    let token = create_session(&state.db, &id, state.config.auth.session_ttl_days).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user: UserResponse {
                id,
                name: request.name,
                email: request.email,
                phone: request.phone,
            },
        }),
    ))
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    // Same message for unknown email and wrong password
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Current user profile
///
/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization").and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}

/// Resolve a token to its user, rejecting expired sessions.
pub async fn get_current_user(pool: &crate::DbPool, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);
    let now = chrono::Utc::now().to_rfc3339();

    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(&token_hash)
            .bind(&now)
            .fetch_optional(pool)
            .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    user.ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
}

/// Extractor for the current authenticated user
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        get_current_user(&state.db, &token).await
    }
}
