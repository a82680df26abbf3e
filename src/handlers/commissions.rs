use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{types::Json as SqlJson, Postgres, QueryBuilder};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    middleware::{get_current_user, CurrentUser},
    models::{
        append_status_entry, AgentBreakdown, CommissionReport, ReportStatus, SalesRecord,
        StatusUpdatePayload,
    },
    visibility::{filter_by_scope, resolve_scope, AreaScope},
    AppState,
};

use super::ListResponse;

#[derive(Debug, Default, Deserialize)]
pub struct CommissionFilters {
    pub q: Option<String>,
    pub status: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommissionDetail {
    #[serde(flatten)]
    pub report: CommissionReport,
    pub breakdown: Vec<AgentBreakdown>,
    pub sales: Vec<SalesRecord>,
}

pub(crate) async fn fetch_visible_reports(
    db: &Database,
    user: &CurrentUser,
    filters: &CommissionFilters,
) -> Result<(Vec<CommissionReport>, AreaScope), ApiError> {
    let scope = resolve_scope(user, filters.area.as_deref());

    let mut qb =
        QueryBuilder::<Postgres>::new("SELECT * FROM commission_reports WHERE deleted_at IS NULL");

    if let Some(q) = filters.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND report_number ILIKE ");
        qb.push_bind(format!("%{}%", q));
    }

    if let Some(token) = filters.status.as_deref().filter(|s| !s.is_empty()) {
        let status = ReportStatus::from_ui_token(token)
            .ok_or_else(|| ApiError::Validation(format!("unknown status token: {}", token)))?;
        qb.push(" AND status = ");
        qb.push_bind(status.storage_label());
    }

    qb.push(" ORDER BY created_at DESC");

    let reports = qb.build_query_as::<CommissionReport>().fetch_all(db).await?;
    let reports = filter_by_scope(db, reports, &scope).await?;

    Ok((reports, scope))
}

pub(crate) async fn fetch_visible_report(
    db: &Database,
    user: &CurrentUser,
    report_id: Uuid,
) -> Result<CommissionReport, ApiError> {
    let report = sqlx::query_as::<_, CommissionReport>(
        "SELECT * FROM commission_reports WHERE uuid = $1 AND deleted_at IS NULL",
    )
    .bind(report_id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let scope = resolve_scope(user, None);
    let mut visible = filter_by_scope(db, vec![report], &scope).await?;
    visible.pop().ok_or(ApiError::NotFound)
}

pub async fn list_commissions(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<CommissionFilters>,
) -> Result<Json<ListResponse<CommissionReport>>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (reports, scope) = fetch_visible_reports(&state.db, &current_user, &filters).await?;
    Ok(Json(ListResponse::new(reports, &scope)))
}

pub async fn get_commission(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(report_id): Path<Uuid>,
) -> Result<Json<CommissionDetail>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let report = fetch_visible_report(&state.db, &current_user, report_id).await?;

    let breakdown = sqlx::query_as::<_, AgentBreakdown>(
        "SELECT * FROM commission_agent_breakdown WHERE report_uuid = $1 ORDER BY beneficiary",
    )
    .bind(report.uuid)
    .fetch_all(&state.db)
    .await?;

    let sales = if report.sales_uuids.is_empty() {
        Vec::new()
    } else {
        let records = sqlx::query_as::<_, SalesRecord>(
            "SELECT * FROM sales_records WHERE id = ANY($1) AND is_deleted = false ORDER BY tax_month DESC",
        )
        .bind(&report.sales_uuids)
        .fetch_all(&state.db)
        .await?;
        let scope = resolve_scope(&current_user, None);
        filter_by_scope(&state.db, records, &scope).await?
    };

    Ok(Json(CommissionDetail {
        report,
        breakdown,
        sales,
    }))
}

/// Overwrite the status and remarks, and append one audit entry. Any
/// status may move to any other; history entries are never rewritten.
pub async fn update_status(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(report_id): Path<Uuid>,
    Json(payload): Json<StatusUpdatePayload>,
) -> Result<Json<CommissionReport>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let report = fetch_visible_report(&state.db, &current_user, report_id).await?;

    let status = ReportStatus::from_ui_token(&payload.status)
        .ok_or_else(|| ApiError::Validation(format!("unknown status token: {}", payload.status)))?;
    let remarks = payload.remarks.unwrap_or_default();

    let history = append_status_entry(
        report.history.0,
        status,
        &remarks,
        current_user.id,
        &current_user.full_name,
    );

    let report = sqlx::query_as::<_, CommissionReport>(
        r#"
        UPDATE commission_reports
        SET status = $1, remarks = $2, history = $3, updated_at = NOW()
        WHERE uuid = $4
        RETURNING *
        "#,
    )
    .bind(status.storage_label())
    .bind(&remarks)
    .bind(SqlJson(history))
    .bind(report.uuid)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(report))
}

pub async fn delete_commission(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let report = fetch_visible_report(&state.db, &current_user, report_id).await?;

    sqlx::query(
        "UPDATE commission_reports SET deleted_at = NOW(), updated_at = NOW() WHERE uuid = $1",
    )
    .bind(report.uuid)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({ "ok": true })))
}
