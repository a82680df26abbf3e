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
    models::{RecordPayload, RemarkEntry, RemarkPayload, SalesRecord},
    registry::{self, ListingInput},
    visibility::{filter_by_scope, resolve_scope, AreaScope},
    AppState,
};

use super::{push_record_filters, validate_record_payload, ListResponse, RecordFilters};

pub(crate) async fn fetch_visible_sales(
    db: &Database,
    user: &CurrentUser,
    filters: &RecordFilters,
) -> Result<(Vec<SalesRecord>, AreaScope), ApiError> {
    let scope = resolve_scope(user, filters.area.as_deref());

    let mut qb =
        QueryBuilder::<Postgres>::new("SELECT * FROM sales_records WHERE is_deleted = false");
    push_record_filters(&mut qb, filters)?;
    qb.push(" ORDER BY tax_month DESC, created_at DESC");

    let records = qb.build_query_as::<SalesRecord>().fetch_all(db).await?;
    let records = filter_by_scope(db, records, &scope).await?;

    Ok((records, scope))
}

/// Fetch one record and apply the caller's visibility to it. Records the
/// caller may not see surface as not-found, same as deleted ones.
pub(crate) async fn fetch_visible_sale(
    db: &Database,
    user: &CurrentUser,
    record_id: Uuid,
) -> Result<SalesRecord, ApiError> {
    let record = sqlx::query_as::<_, SalesRecord>(
        "SELECT * FROM sales_records WHERE id = $1 AND is_deleted = false",
    )
    .bind(record_id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let scope = resolve_scope(user, None);
    let mut visible = filter_by_scope(db, vec![record], &scope).await?;
    visible.pop().ok_or(ApiError::NotFound)
}

pub async fn list_sales(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<RecordFilters>,
) -> Result<Json<ListResponse<SalesRecord>>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (records, scope) = fetch_visible_sales(&state.db, &current_user, &filters).await?;
    Ok(Json(ListResponse::new(records, &scope)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
) -> Result<Json<SalesRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_sale(&state.db, &current_user, record_id).await?;
    Ok(Json(record))
}

pub async fn create_sale(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<RecordPayload>,
) -> Result<Json<SalesRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let parsed = validate_record_payload(&payload)?;

    // Registry upsert runs before the record insert; see registry.rs for
    // the non-atomicity note.
    registry::get_or_create_listing(
        &state.db,
        &ListingInput {
            tin: &parsed.tin,
            registered_name: payload.registered_name.trim(),
            address_line1: payload.address_line1.as_deref(),
            address_line2: payload.address_line2.as_deref(),
            listing_type: "sales",
        },
        current_user.id,
    )
    .await?;

    let record = sqlx::query_as::<_, SalesRecord>(
        r#"
        INSERT INTO sales_records (
            tax_month, tin, registered_name, address_line1, address_line2,
            tax_type, sale_type, gross_taxable, total_actual_amount,
            invoice_number, pickup_date, user_uuid
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
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
    .bind(parsed.gross_taxable)
    .bind(parsed.total_actual_amount)
    .bind(&payload.invoice_number)
    .bind(parsed.pickup_date)
    .bind(current_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}

pub async fn update_sale(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
    Json(payload): Json<RecordPayload>,
) -> Result<Json<SalesRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let existing = fetch_visible_sale(&state.db, &current_user, record_id).await?;
    let parsed = validate_record_payload(&payload)?;

    // Edits may introduce a TIN the registry has not seen yet.
    registry::get_or_create_listing(
        &state.db,
        &ListingInput {
            tin: &parsed.tin,
            registered_name: payload.registered_name.trim(),
            address_line1: payload.address_line1.as_deref(),
            address_line2: payload.address_line2.as_deref(),
            listing_type: "sales",
        },
        current_user.id,
    )
    .await?;

    let record = sqlx::query_as::<_, SalesRecord>(
        r#"
        UPDATE sales_records
        SET tax_month = $1, tin = $2, registered_name = $3, address_line1 = $4,
            address_line2 = $5, tax_type = $6, sale_type = $7, gross_taxable = $8,
            total_actual_amount = $9, invoice_number = $10, pickup_date = $11,
            updated_at = NOW()
        WHERE id = $12
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
    .bind(parsed.gross_taxable)
    .bind(parsed.total_actual_amount)
    .bind(&payload.invoice_number)
    .bind(parsed.pickup_date)
    .bind(existing.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(record_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_sale(&state.db, &current_user, record_id).await?;

    sqlx::query(
        "UPDATE sales_records SET is_deleted = true, deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
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
) -> Result<Json<SalesRecord>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let record = fetch_visible_sale(&state.db, &current_user, record_id).await?;

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

    let record = sqlx::query_as::<_, SalesRecord>(
        "UPDATE sales_records SET remarks = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(SqlJson(remarks))
    .bind(record.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(record))
}
