use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{UserProfile, UserResponse},
    utils::{create_token, verify_password},
    AppState,
};

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::Validation("invalid email or password".to_string()))?;

    if user.status != "active" {
        return Err(ApiError::Forbidden);
    }

    // Profile-only accounts have no password hash and cannot log in.
    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::Validation("invalid email or password".to_string()))?;

    if !verify_password(&payload.password, hash).unwrap_or(false) {
        return Err(ApiError::Validation("invalid email or password".to_string()));
    }

    let token = create_token(user.id, user.email.clone())
        .map_err(|e| ApiError::Internal(format!("token creation failed: {}", e)))?;

    // Session record for tracking; login still succeeds if these writes fail
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::hours(24);

    let _ = sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(user.id)
        .bind(expires_at)
        .execute(&state.db)
        .await;

    let _ = sqlx::query("UPDATE user_profiles SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await;

    let cookie = Cookie::build(("auth_token", token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(24))
        .build();

    cookies.add(cookie);

    Ok(Json(UserResponse::from(user)))
}

pub async fn logout(cookies: Cookies) -> Json<Value> {
    cookies.remove(Cookie::from("auth_token"));
    Json(json!({ "ok": true }))
}
