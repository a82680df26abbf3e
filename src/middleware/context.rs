use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    models::{Role, UserProfile},
    utils::verify_token,
};

/// Request-scoped view of the authenticated account. Resolved once per
/// request from the auth cookie and passed explicitly to everything that
/// filters or mutates records.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub assigned_area: Option<String>,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

pub async fn get_current_user(cookies: &Cookies, db: &Database) -> Result<CurrentUser, ApiError> {
    let token = cookies
        .get("auth_token")
        .ok_or(ApiError::Unauthorized)?
        .value()
        .to_string();

    let claims = verify_token(&token).map_err(|_| ApiError::Unauthorized)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    // Suspended and deactivated accounts lose access immediately, not just
    // at the next login.
    let profile = sqlx::query_as::<_, UserProfile>(
        "SELECT * FROM user_profiles WHERE id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::Unauthorized)?;

    let role = Role::parse(&profile.role).ok_or(ApiError::Unauthorized)?;

    Ok(CurrentUser {
        id: profile.id,
        email: profile.email,
        full_name: profile.full_name,
        role,
        assigned_area: profile.assigned_area,
    })
}
