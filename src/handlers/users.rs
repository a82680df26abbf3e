use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::get_current_user,
    models::{CreateUserPayload, Role, UpdateUserPayload, UserProfile, UserResponse, USER_STATUSES},
    utils::hash_password,
    AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let users =
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles ORDER BY first_name, last_name")
            .fetch_all(&state.db)
            .await?
            .into_iter()
            .map(UserResponse::from)
            .collect();

    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<CreateUserPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let email = payload.email.trim().to_string();
    if !email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }

    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("first and last name are required".to_string()));
    }

    if Role::parse(&payload.role).is_none() {
        return Err(ApiError::Validation(format!("unknown role: {}", payload.role)));
    }

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM user_profiles WHERE email = $1")
            .bind(&email)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(ApiError::Validation("email is already registered".to_string()));
    }

    // Password is optional: accounts without one are profile-only and
    // can never log in.
    let password_hash = match payload.password.as_deref().map(str::trim) {
        Some(password) if !password.is_empty() => {
            if password.len() < 6 {
                return Err(ApiError::Validation(
                    "password must be at least 6 characters".to_string(),
                ));
            }
            Some(hash_password(password).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        _ => None,
    };

    let full_name = format!("{} {}", payload.first_name.trim(), payload.last_name.trim());

    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO user_profiles (email, password_hash, first_name, last_name, full_name, role, status, assigned_area)
        VALUES ($1, $2, $3, $4, $5, $6, 'active', $7)
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&full_name)
    .bind(&payload.role)
    .bind(&payload.assigned_area)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let existing = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound)?;

    let email = match payload.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => {
            if !email.contains('@') {
                return Err(ApiError::Validation("a valid email is required".to_string()));
            }
            email.to_string()
        }
        _ => existing.email.clone(),
    };

    let role = match payload.role.as_deref() {
        Some(role) => {
            if Role::parse(role).is_none() {
                return Err(ApiError::Validation(format!("unknown role: {}", role)));
            }
            role.to_string()
        }
        None => existing.role.clone(),
    };

    let status = match payload.status.as_deref() {
        Some(status) => {
            if !USER_STATUSES.contains(&status) {
                return Err(ApiError::Validation(format!("unknown status: {}", status)));
            }
            status.to_string()
        }
        None => existing.status.clone(),
    };

    let first_name = payload
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&existing.first_name)
        .to_string();
    let last_name = payload
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&existing.last_name)
        .to_string();
    let full_name = format!("{} {}", first_name, last_name);

    let assigned_area = match payload.assigned_area {
        Some(area) => {
            let area = area.trim().to_string();
            if area.is_empty() {
                None
            } else {
                Some(area)
            }
        }
        None => existing.assigned_area.clone(),
    };

    let password_hash = match payload.password.as_deref().map(str::trim) {
        Some(password) if !password.is_empty() => {
            if password.len() < 6 {
                return Err(ApiError::Validation(
                    "password must be at least 6 characters".to_string(),
                ));
            }
            Some(hash_password(password).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        _ => existing.password_hash.clone(),
    };

    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET email = $1, password_hash = $2, first_name = $3, last_name = $4,
            full_name = $5, role = $6, status = $7, assigned_area = $8, updated_at = NOW()
        WHERE id = $9
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&first_name)
    .bind(&last_name)
    .bind(&full_name)
    .bind(&role)
    .bind(&status)
    .bind(&assigned_area)
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    if current_user.id == user_id {
        return Err(ApiError::Validation("cannot delete your own account".to_string()));
    }

    let result = sqlx::query("DELETE FROM user_profiles WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}
