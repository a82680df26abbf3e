use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::get_current_user,
    models::{
        valid_listing_type, CreateListingPayload, ListingSuggestion, TaxpayerListing,
        UpdateListingPayload,
    },
    utils::normalize_tin,
    visibility::{filter_by_scope, resolve_scope},
    AppState,
};

use super::ListResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListingFilters {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub area: Option<String>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<ListingFilters>,
) -> Result<Json<ListResponse<TaxpayerListing>>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let scope = resolve_scope(&current_user, filters.area.as_deref());

    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM taxpayer_listings");
    let mut first = true;
    let mut sep = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if let Some(listing_type) = filters.listing_type.as_deref().filter(|t| !t.is_empty()) {
        if !valid_listing_type(listing_type) {
            return Err(ApiError::Validation(format!(
                "unknown listing type: {}",
                listing_type
            )));
        }
        sep(&mut qb);
        qb.push("listing_type = ");
        qb.push_bind(listing_type.to_string());
    }

    if let Some(q) = filters.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let digits = normalize_tin(q);
        sep(&mut qb);
        qb.push("(registered_name ILIKE ");
        qb.push_bind(format!("%{}%", q));
        if !digits.is_empty() {
            qb.push(" OR tin LIKE ");
            qb.push_bind(format!("{}%", digits));
        }
        qb.push(")");
    }

    qb.push(" ORDER BY registered_name");

    let listings = qb
        .build_query_as::<TaxpayerListing>()
        .fetch_all(&state.db)
        .await?;

    let listings = filter_by_scope(&state.db, listings, &scope).await?;

    Ok(Json(ListResponse::new(listings, &scope)))
}

/// Autocomplete for the creation forms: a TIN prefix of at least three
/// digits or a name substring of at least three characters, capped at
/// five suggestions. Anything shorter returns an empty list so the UI
/// clears its suggestion dropdown.
pub async fn suggest_listings(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<ListingFilters>,
) -> Result<Json<Vec<ListingSuggestion>>, ApiError> {
    get_current_user(&cookies, &state.db).await?;

    let listing_type = filters.listing_type.as_deref().unwrap_or_default();
    if !valid_listing_type(listing_type) {
        return Err(ApiError::Validation(
            "type must be sales or purchases".to_string(),
        ));
    }

    let q = filters.q.as_deref().map(str::trim).unwrap_or_default();
    let digits = normalize_tin(q);
    let looks_like_tin = !digits.is_empty()
        && q.chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c.is_whitespace());

    let condition = if looks_like_tin {
        if digits.len() < 3 {
            return Ok(Json(Vec::new()));
        }
        ("tin LIKE ", format!("{}%", digits))
    } else {
        if q.chars().count() < 3 {
            return Ok(Json(Vec::new()));
        }
        ("registered_name ILIKE ", format!("%{}%", q))
    };

    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT id, tin, registered_name, address_line1, address_line2 FROM taxpayer_listings WHERE listing_type = ",
    );
    qb.push_bind(listing_type.to_string());
    qb.push(" AND ");
    qb.push(condition.0);
    qb.push_bind(condition.1);
    qb.push(" ORDER BY registered_name LIMIT 5");

    let suggestions = qb
        .build_query_as::<ListingSuggestion>()
        .fetch_all(&state.db)
        .await?;

    Ok(Json(suggestions))
}

pub async fn create_listing(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<CreateListingPayload>,
) -> Result<Json<TaxpayerListing>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;

    if !valid_listing_type(&payload.listing_type) {
        return Err(ApiError::Validation(
            "listing_type must be sales or purchases".to_string(),
        ));
    }

    let tin = normalize_tin(&payload.tin);
    if tin.is_empty() {
        return Err(ApiError::Validation(
            "TIN must contain at least one digit".to_string(),
        ));
    }

    if payload.registered_name.trim().is_empty() {
        return Err(ApiError::Validation("registered_name is required".to_string()));
    }

    let duplicate: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM taxpayer_listings WHERE tin = $1 AND listing_type = $2")
            .bind(&tin)
            .bind(&payload.listing_type)
            .fetch_optional(&state.db)
            .await?;
    if duplicate.is_some() {
        return Err(ApiError::Validation(
            "a listing for this TIN and type already exists".to_string(),
        ));
    }

    let listing = sqlx::query_as::<_, TaxpayerListing>(
        r#"
        INSERT INTO taxpayer_listings (tin, registered_name, address_line1, address_line2, listing_type, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&tin)
    .bind(payload.registered_name.trim())
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.listing_type)
    .bind(current_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(listing))
}

pub async fn update_listing(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(listing_id): Path<Uuid>,
    Json(payload): Json<UpdateListingPayload>,
) -> Result<Json<TaxpayerListing>, ApiError> {
    get_current_user(&cookies, &state.db).await?;

    let existing =
        sqlx::query_as::<_, TaxpayerListing>("SELECT * FROM taxpayer_listings WHERE id = $1")
            .bind(listing_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(ApiError::NotFound)?;

    let tin = match payload.tin.as_deref() {
        Some(raw) => {
            let tin = normalize_tin(raw);
            if tin.is_empty() {
                return Err(ApiError::Validation(
                    "TIN must contain at least one digit".to_string(),
                ));
            }
            tin
        }
        None => existing.tin.clone(),
    };

    if tin != existing.tin {
        let duplicate: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM taxpayer_listings WHERE tin = $1 AND listing_type = $2 AND id <> $3",
        )
        .bind(&tin)
        .bind(&existing.listing_type)
        .bind(listing_id)
        .fetch_optional(&state.db)
        .await?;
        if duplicate.is_some() {
            return Err(ApiError::Validation(
                "a listing for this TIN and type already exists".to_string(),
            ));
        }
    }

    let registered_name = payload
        .registered_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&existing.registered_name)
        .to_string();
    let address_line1 = payload.address_line1.or(existing.address_line1);
    let address_line2 = payload.address_line2.or(existing.address_line2);

    let listing = sqlx::query_as::<_, TaxpayerListing>(
        r#"
        UPDATE taxpayer_listings
        SET tin = $1, registered_name = $2, address_line1 = $3, address_line2 = $4, updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&tin)
    .bind(&registered_name)
    .bind(&address_line1)
    .bind(&address_line2)
    .bind(listing_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(listing))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let result = sqlx::query("DELETE FROM taxpayer_listings WHERE id = $1")
        .bind(listing_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}
