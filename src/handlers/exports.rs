use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tower_cookies::Cookies;

use crate::{
    error::ApiError,
    middleware::get_current_user,
    models::{CommissionReport, PurchaseRecord, SalesRecord},
    utils::format_tin,
    AppState,
};

use super::{
    commissions::{fetch_visible_reports, CommissionFilters},
    purchases::fetch_visible_purchases,
    sales::fetch_visible_sales,
    RecordFilters,
};

// Fixed layout: title, generated line, record count, a blank row, then
// the header row.
const HEADER_ROW: u32 = 4;
const DATA_START_ROW: u32 = 5;

const RECORD_COLUMNS: &[(&str, f64)] = &[
    ("Tax Month", 12.0),
    ("TIN", 16.0),
    ("Registered Name", 36.0),
    ("Tax Type", 10.0),
    ("Sale Type", 14.0),
    ("Invoice No.", 14.0),
    ("Gross Taxable", 16.0),
    ("Total Actual Amount", 18.0),
];

const COMMISSION_COLUMNS: &[(&str, f64)] = &[
    ("Report No.", 18.0),
    ("Status", 22.0),
    ("Created", 14.0),
    ("Sales Records", 14.0),
    ("Remarks", 40.0),
];

/// One detail row, with amounts kept numeric so the cells come out as
/// numbers rather than formatted strings.
#[derive(Debug, PartialEq)]
pub(crate) struct RecordExportRow {
    pub month: String,
    pub tin: String,
    pub name: String,
    pub tax_type: String,
    pub sale_type: String,
    pub invoice_number: String,
    pub gross_taxable: f64,
    pub total_actual_amount: Option<f64>,
}

pub(crate) fn sales_rows(records: &[SalesRecord]) -> Vec<RecordExportRow> {
    records
        .iter()
        .map(|r| RecordExportRow {
            month: r.tax_month.format("%b %Y").to_string(),
            tin: format_tin(&r.tin),
            name: r.registered_name.clone(),
            tax_type: r.tax_type.clone(),
            sale_type: r.sale_type.clone().unwrap_or_default(),
            invoice_number: r.invoice_number.clone().unwrap_or_default(),
            gross_taxable: r.gross_taxable.to_f64().unwrap_or(0.0),
            total_actual_amount: r.total_actual_amount.and_then(|d| d.to_f64()),
        })
        .collect()
}

pub(crate) fn purchase_rows(records: &[PurchaseRecord]) -> Vec<RecordExportRow> {
    records
        .iter()
        .map(|r| RecordExportRow {
            month: r.tax_month.format("%b %Y").to_string(),
            tin: format_tin(&r.tin),
            name: r.registered_name.clone(),
            tax_type: r.tax_type.clone(),
            sale_type: r.sale_type.clone().unwrap_or_default(),
            invoice_number: r.invoice_number.clone().unwrap_or_default(),
            gross_taxable: r.gross_taxable.to_f64().unwrap_or(0.0),
            total_actual_amount: r.total_actual_amount.and_then(|d| d.to_f64()),
        })
        .collect()
}

fn build_record_workbook(title: &str, rows: &[RecordExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    sheet.write_string_with_format(0, 0, title, &bold)?;
    sheet.write_string(1, 0, format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M")))?;
    sheet.write_string(2, 0, format!("Records: {}", rows.len()))?;

    for (col, (label, width)) in RECORD_COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_string_with_format(HEADER_ROW, col, *label, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = DATA_START_ROW + i as u32;
        sheet.write_string(r, 0, &row.month)?;
        sheet.write_string(r, 1, &row.tin)?;
        sheet.write_string(r, 2, &row.name)?;
        sheet.write_string(r, 3, &row.tax_type)?;
        sheet.write_string(r, 4, &row.sale_type)?;
        sheet.write_string(r, 5, &row.invoice_number)?;
        sheet.write_number(r, 6, row.gross_taxable)?;
        if let Some(total) = row.total_actual_amount {
            sheet.write_number(r, 7, total)?;
        }
    }

    workbook.save_to_buffer()
}

fn build_commission_workbook(reports: &[CommissionReport]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    sheet.write_string_with_format(0, 0, "Commission Reports", &bold)?;
    sheet.write_string(1, 0, format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M")))?;
    sheet.write_string(2, 0, format!("Records: {}", reports.len()))?;

    for (col, (label, width)) in COMMISSION_COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_string_with_format(HEADER_ROW, col, *label, &bold)?;
    }

    for (i, report) in reports.iter().enumerate() {
        let r = DATA_START_ROW + i as u32;
        sheet.write_string(r, 0, &report.report_number)?;
        sheet.write_string(r, 1, &report.status)?;
        sheet.write_string(r, 2, report.created_at.format("%b %Y").to_string())?;
        sheet.write_number(r, 3, report.sales_uuids.len() as f64)?;
        sheet.write_string(r, 4, report.remarks.clone().unwrap_or_default())?;
    }

    workbook.save_to_buffer()
}

fn xlsx_response(prefix: &str, bytes: Vec<u8>) -> Result<impl IntoResponse, ApiError> {
    let filename = format!("{}-{}.xlsx", prefix, Utc::now().format("%Y%m%d-%H%M%S"));
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    Ok((headers, bytes))
}

pub async fn export_sales(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<RecordFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (records, _) = fetch_visible_sales(&state.db, &current_user, &filters).await?;

    let rows = sales_rows(&records);
    let bytes = build_record_workbook("Sales Records", &rows)
        .map_err(|e| ApiError::Internal(format!("export failed: {}", e)))?;

    xlsx_response("sales-export", bytes)
}

pub async fn export_purchases(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<RecordFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (records, _) = fetch_visible_purchases(&state.db, &current_user, &filters).await?;

    let rows = purchase_rows(&records);
    let bytes = build_record_workbook("Purchase Records", &rows)
        .map_err(|e| ApiError::Internal(format!("export failed: {}", e)))?;

    xlsx_response("purchases-export", bytes)
}

pub async fn export_commissions(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(filters): Query<CommissionFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = get_current_user(&cookies, &state.db).await?;
    let (reports, _) = fetch_visible_reports(&state.db, &current_user, &filters).await?;

    let bytes = build_commission_workbook(&reports)
        .map_err(|e| ApiError::Internal(format!("export failed: {}", e)))?;

    xlsx_response("commissions-export", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::types::Json;
    use std::str::FromStr;
    use uuid::Uuid;

    fn sale(tin: &str, gross: &str) -> SalesRecord {
        SalesRecord {
            id: Uuid::new_v4(),
            tax_month: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            tin: tin.to_string(),
            registered_name: "Acme Corp".to_string(),
            address_line1: None,
            address_line2: None,
            tax_type: "vat".to_string(),
            sale_type: None,
            gross_taxable: Decimal::from_str(gross).unwrap(),
            total_actual_amount: None,
            invoice_number: Some("INV-001".to_string()),
            pickup_date: None,
            cheque: Json(Vec::new()),
            voucher: Json(Vec::new()),
            invoice: Json(Vec::new()),
            doc_2307: Json(Vec::new()),
            deposit_slip: Json(Vec::new()),
            remarks: Json(Vec::new()),
            user_uuid: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn one_detail_row_per_record() {
        let records = vec![
            sale("123456789", "15000.50"),
            sale("987654321", "100"),
            sale("111222333", "0"),
        ];
        let rows = sales_rows(&records);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn amounts_stay_numeric_and_tin_gets_dashes() {
        let rows = sales_rows(&[sale("123456789", "15000.50")]);
        assert_eq!(rows[0].gross_taxable, 15000.50);
        assert_eq!(rows[0].tin, "123-456-789");
        assert_eq!(rows[0].month, "Mar 2024");
    }

    #[test]
    fn workbook_builds_for_empty_and_populated_sets() {
        assert!(build_record_workbook("Sales Records", &[]).is_ok());
        let rows = sales_rows(&[sale("123456789", "1.25")]);
        let bytes = build_record_workbook("Sales Records", &rows).expect("workbook");
        assert!(!bytes.is_empty());
    }
}
