//! Password reset flow.
//!
//! The forgot endpoint always answers with the same acknowledgement whether
//! or not the email exists, so it cannot be used to enumerate accounts. Only
//! the sha256 hash of the reset token is stored; the raw token travels once,
//! inside the emailed link, and is consumed on a successful reset.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::{
    ForgotPasswordRequest, PasswordReset, ResetPasswordRequest, User, VerifyResetTokenRequest,
};
use crate::notifications::email::SystemEmailService;
use crate::AppState;

use super::auth::{generate_token, hash_password, hash_token};
use super::error::ApiError;
use super::validation::validate_password;

const GENERIC_ACK: &str =
    "If an account exists for that email, a password reset link has been sent";

/// Build the emailed reset link. Query values are percent-encoded; addresses
/// like `jane+cars@example.com` must survive the round trip through the URL.
fn build_reset_url(public_url: &str, token: &str, email: &str) -> String {
    format!(
        "{}/reset-password?token={}&email={}",
        public_url,
        urlencoding::encode(token),
        urlencoding::encode(email)
    )
}

/// Create a reset row for the user and return the raw token. Prior tokens
/// for the same user are invalidated.
async fn issue_reset_token(
    pool: &crate::DbPool,
    user_id: &str,
    ttl_minutes: i64,
) -> Result<String, sqlx::Error> {
    sqlx::query("DELETE FROM password_resets WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    let token = generate_token();
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::minutes(ttl_minutes)).to_rfc3339();

    sqlx::query(
        "INSERT INTO password_resets (id, user_id, token_hash, expires_at, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Look up an unexpired reset row matching the supplied token and email.
async fn find_valid_reset(
    pool: &crate::DbPool,
    email: &str,
    token: &str,
) -> Result<Option<(User, PasswordReset)>, sqlx::Error> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    let Some(user) = user else {
        return Ok(None);
    };

    let now = chrono::Utc::now().to_rfc3339();
    let reset: Option<PasswordReset> = sqlx::query_as(
        "SELECT * FROM password_resets WHERE user_id = ? AND token_hash = ? AND expires_at > ?",
    )
    .bind(&user.id)
    .bind(hash_token(token))
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    Ok(reset.map(|reset| (user, reset)))
}

/// Request a password reset email
///
/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    if let Some(user) = user {
        let ttl = state.config.auth.reset_token_ttl_minutes;
        let token = issue_reset_token(&state.db, &user.id, ttl).await?;

        let reset_url = build_reset_url(&state.config.server.public_url, &token, &user.email);
        let mailer = SystemEmailService::new(state.config.email.clone());

        // Best effort: a failed send is logged, never surfaced to the caller
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_password_reset_email(&user.email, &user.name, &reset_url, ttl)
                .await
            {
                tracing::error!(email = %user.email, error = %e, "Failed to send reset email");
            }
        });
    }

    Ok(Json(json!({ "message": GENERIC_ACK })))
}

/// Check a reset token without consuming it
///
/// POST /api/auth/verify-reset-token
pub async fn verify_reset_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyResetTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    match find_valid_reset(&state.db, &request.email, &request.token).await? {
        Some(_) => Ok(Json(json!({ "valid": true }))),
        None => Err(ApiError::bad_request("Invalid or expired reset token")),
    }
}

/// Set a new password using a reset token
///
/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_password(&request.new_password).map_err(ApiError::validation)?;

    let (user, reset) = find_valid_reset(&state.db, &request.email, &request.token)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    let password_hash = hash_password(&request.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    // Single use: the token is gone, and so are existing sessions
    sqlx::query("DELETE FROM password_resets WHERE id = ?")
        .bind(&reset.id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    tracing::info!(email = %user.email, "Password reset completed");

    Ok(Json(json!({ "message": "Password has been reset" })))
}
