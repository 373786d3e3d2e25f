// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, conflict_on_unique},
    extract::AppJson,
    models::user::{LoginRequest, MeResponse, Owner, RegisterRequest, User, normalize_email},
    permissions::Principal,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password, is_superuser, created_at, updated_at";

/// Registers a new quiz owner.
///
/// Hashes the password using Argon2, then creates the account and its owner
/// profile in one transaction.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let hashed_password = hash_password(&payload.password)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(hashed_password)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on_unique(e, format!("Email '{}' is already registered", email)))?;

    let owner = sqlx::query_as::<_, Owner>(
        r#"
        INSERT INTO owners (user_id)
        VALUES ($1)
        RETURNING id, user_id, created_at, updated_at
        "#,
    )
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("User {} registered as owner {}", user.id, owner.id);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Invited participants can only log in after accepting an invite, which is
/// when their password is set.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = $1"
    ))
    .bind(normalize_email(&payload.email))
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let user = user.ok_or_else(invalid)?;
    let password_hash = user.password.as_deref().ok_or_else(invalid)?;

    if !verify_password(&payload.password, password_hash)? {
        return Err(invalid());
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": config.jwt_expiration,
    })))
}

/// Returns the caller's identity and role ids.
pub async fn me(principal: Principal) -> Result<impl IntoResponse, AppError> {
    Ok(Json(MeResponse {
        id: principal.user_id,
        email: principal.email,
        is_superuser: principal.is_superuser,
        owner_id: principal.owner_id,
        participant_id: principal.participant_id,
    }))
}
