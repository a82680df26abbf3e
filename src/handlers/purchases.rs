use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{types::Json as SqlJson, Postgres, QueryBuilder};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    middleware::{get_current_user, CurrentUser},
    models::{CategoryPayload, PurchaseCategory, PurchaseRecord, RecordPayload, RemarkEntry, RemarkPayload},
    registry::{self, ListingInput},
    visibility::{filter_by_scope, resolve_scope, AreaScope},
    AppState,
};

use super::{push_record_filters, validate_record_payload, ListResponse, RecordFilters};

pub(crate) async fn fetch_visible_purchases(
    db: &Database,
    user: &CurrentUser,
    filters: &RecordFilters,
) -> Result<(Vec<PurchaseRecord>, AreaScope), ApiError> {
    let scope = resolve_scope(user, filters.area.as_deref());

    let mut qb =
        QueryBuilder::<Postgres>::new("SELECT * FROM purchase_records WHERE is_deleted = false");
    if let Some(category_id) = filters.category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(category_id);
    }
    push_record_filters(&mut qb, filters)?;
    qb.push(" ORDER BY tax_month DESC, created_at DESC");

    let records = qb.build_query_as::<PurchaseRecord>().fetch_all(db).await?;
    let records = filter_by_scope(db, records, &scope).await?;

    Ok((records, scope))
}

pub(crate) async fn fetch_visible_purchase(
    db: &Database,
    user: &CurrentUser,
    record_id: Uuid,
) -> Result<PurchaseRecord, ApiError> {
    let record = sqlx::query_as::<_, PurchaseRecord>(
        "SELECT * FROM purchase_records WHERE id = $1 AND is_deleted = false",
    )
    .bind(record_id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let scope = resolve_scope(user, None);
    let mut visible = filter_by_scope(db, vec![record], &scope).await?;
    visible.pop().ok_or(ApiError::NotFound)
}

async fn require_category(db: &Database, category_id: Uuid) -> Result<(), ApiError> {
    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM purchase_categories WHERE id = $1 AND is_deleted = false")
            .bind(category_id)
            .fetch_optional(db)
            .await?;
    if exists.is_none() {
        return Err(ApiError::Validation("unknown purchase category".to_string()));
    }
    Ok(())
}

pub async fn list_purchases(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<RecordFilters>,
) -> Result<Json<ListResponse<PurchaseRecord>>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (records, scope) = fetch_visible_purchases(&state.db, &current_user, &filters).await?;
    Ok(Json(ListResponse::new(records, &scope)))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
) -> Result<Json<PurchaseRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_purchase(&state.db, &current_user, record_id).await?;
    Ok(Json(record))
}

pub async fn create_purchase(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<RecordPayload>,
) -> Result<Json<PurchaseRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let parsed = validate_record_payload(&payload)?;

    if let Some(category_id) = payload.category_id {
        require_category(&state.db, category_id).await?;
    }

    registry::get_or_create_listing(
        &state.db,
        &ListingInput {
            tin: &parsed.tin,
            registered_name: payload.registered_name.trim(),
            address_line1: payload.address_line1.as_deref(),
            address_line2: payload.address_line2.as_deref(),
            listing_type: "purchases",
        },
        current_user.id,
    )
    .await?;

    let record = sqlx::query_as::<_, PurchaseRecord>(
        r#"
        INSERT INTO purchase_records (
            tax_month, tin, registered_name, address_line1, address_line2,
            tax_type, sale_type, category_id, gross_taxable, total_actual_amount,
            invoice_number, pickup_date, user_uuid
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(parsed.tax_month)
    .bind(&parsed.tin)
    .bind(payload.registered_name.trim())
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.tax_type)
    .bind(&payload.sale_type)
    .bind(payload.category_id)
    .bind(parsed.gross_taxable)
    .bind(parsed.total_actual_amount)
    .bind(&payload.invoice_number)
    .bind(parsed.pickup_date)
    .bind(current_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}

pub async fn update_purchase(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    Json(payload): Json<RecordPayload>,
) -> Result<Json<PurchaseRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let existing = fetch_visible_purchase(&state.db, &current_user, record_id).await?;
    let parsed = validate_record_payload(&payload)?;

    if let Some(category_id) = payload.category_id {
        require_category(&state.db, category_id).await?;
    }

    registry::get_or_create_listing(
        &state.db,
        &ListingInput {
            tin: &parsed.tin,
            registered_name: payload.registered_name.trim(),
            address_line1: payload.address_line1.as_deref(),
            address_line2: payload.address_line2.as_deref(),
            listing_type: "purchases",
        },
        current_user.id,
    )
    .await?;

    let record = sqlx::query_as::<_, PurchaseRecord>(
        r#"
        UPDATE purchase_records
        SET tax_month = $1, tin = $2, registered_name = $3, address_line1 = $4,
            address_line2 = $5, tax_type = $6, sale_type = $7, category_id = $8,
            gross_taxable = $9, total_actual_amount = $10, invoice_number = $11,
            pickup_date = $12, updated_at = NOW()
        WHERE id = $13
        RETURNING *
        "#,
    )
    .bind(parsed.tax_month)
    .bind(&parsed.tin)
    .bind(payload.registered_name.trim())
    .bind(&payload.address_line1)
    .bind(&payload.address_line2)
    .bind(&payload.tax_type)
    .bind(&payload.sale_type)
    .bind(payload.category_id)
    .bind(parsed.gross_taxable)
    .bind(parsed.total_actual_amount)
    .bind(&payload.invoice_number)
    .bind(parsed.pickup_date)
    .bind(existing.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}

pub async fn delete_purchase(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_purchase(&state.db, &current_user, record_id).await?;

    sqlx::query(
        "UPDATE purchase_records SET is_deleted = true, deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(record.id)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({ "ok": true })))
}

pub async fn add_remark(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    Json(payload): Json<RemarkPayload>,
) -> Result<Json<PurchaseRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_purchase(&state.db, &current_user, record_id).await?;

    let remark = payload.remark.trim();
    if remark.is_empty() {
        return Err(ApiError::Validation("remark must not be empty".to_string()));
    }

    let mut remarks = record.remarks.0;
    remarks.push(RemarkEntry {
        remark: remark.to_string(),
        name: current_user.full_name.clone(),
        uuid: current_user.id,
        date: Utc::now(),
    });

    let record = sqlx::query_as::<_, PurchaseRecord>(
        "UPDATE purchase_records SET remarks = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(SqlJson(remarks))
    .bind(record.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}

// Purchase categories

pub async fn list_categories(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<Vec<PurchaseCategory>>, ApiError> {
    get_current_user(&cookies, &state.db).await?;

    let categories = sqlx::query_as::<_, PurchaseCategory>(
        "SELECT * FROM purchase_categories WHERE is_deleted = false ORDER BY category",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<CategoryPayload>,
) -> Result<Json<PurchaseCategory>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let label = payload.category.trim();
    if label.is_empty() {
        return Err(ApiError::Validation("category label is required".to_string()));
    }

    let category = sqlx::query_as::<_, PurchaseCategory>(
        "INSERT INTO purchase_categories (category) VALUES ($1) RETURNING *",
    )
    .bind(label)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<Json<PurchaseCategory>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let label = payload.category.trim();
    if label.is_empty() {
        return Err(ApiError::Validation("category label is required".to_string()));
    }

    let category = sqlx::query_as::<_, PurchaseCategory>(
        "UPDATE purchase_categories SET category = $1 WHERE id = $2 AND is_deleted = false RETURNING *",
    )
    .bind(label)
    .bind(category_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    current_user.require_admin()?;

    let result = sqlx::query("UPDATE purchase_categories SET is_deleted = true WHERE id = $1")
        .bind(category_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({ "ok": true })))
}
