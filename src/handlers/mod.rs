pub mod auth;
pub mod commissions;
pub mod exports;
pub mod invoices;
pub mod purchases;
pub mod sales;
pub mod taxpayers;
pub mod uploads;
pub mod users;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{record, RecordPayload},
    utils::{normalize_tin, parse_amount},
    visibility::AreaScope,
};

/// Listing envelope. `no_assigned_area` flags the secretary-without-area
/// state so the UI can render its explanatory empty view instead of an
/// error banner.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub records: Vec<T>,
    pub no_assigned_area: bool,
}

impl<T> ListResponse<T> {
    pub fn new(records: Vec<T>, scope: &AreaScope) -> Self {
        Self {
            records,
            no_assigned_area: scope.is_no_area(),
        }
    }
}

/// Query-string filters shared by the sales and purchase listings.
#[derive(Debug, Default, Deserialize)]
pub struct RecordFilters {
    pub q: Option<String>,
    pub tax_month: Option<String>,
    pub area: Option<String>,
    pub category_id: Option<Uuid>,
}

/// Append the shared tax_month/search conditions to a record listing
/// query. The search term matches the registered name as a substring and,
/// when it contains digits, the TIN as a prefix.
pub(crate) fn push_record_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    filters: &RecordFilters,
) -> Result<(), ApiError> {
    if let Some(month) = filters.tax_month.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let month = NaiveDate::parse_from_str(month, "%Y-%m-%d")
            .map_err(|_| ApiError::Validation("tax_month must be YYYY-MM-DD".to_string()))?;
        qb.push(" AND tax_month = ");
        qb.push_bind(month);
    }

    if let Some(q) = filters.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let digits = normalize_tin(q);
        qb.push(" AND (registered_name ILIKE ");
        qb.push_bind(format!("%{}%", q));
        if !digits.is_empty() {
            qb.push(" OR tin LIKE ");
            qb.push_bind(format!("{}%", digits));
        }
        qb.push(")");
    }

    Ok(())
}

/// Form fields after validation, ready to bind.
#[derive(Debug)]
pub struct ParsedRecord {
    pub tax_month: NaiveDate,
    pub tin: String,
    pub gross_taxable: Decimal,
    pub total_actual_amount: Option<Decimal>,
    pub pickup_date: Option<NaiveDate>,
}

pub(crate) fn validate_record_payload(payload: &RecordPayload) -> Result<ParsedRecord, ApiError> {
    let tax_month = NaiveDate::parse_from_str(payload.tax_month.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("tax_month must be YYYY-MM-DD".to_string()))?;

    let tin = normalize_tin(&payload.tin);
    if tin.is_empty() {
        return Err(ApiError::Validation(
            "TIN must contain at least one digit".to_string(),
        ));
    }

    if payload.registered_name.trim().is_empty() {
        return Err(ApiError::Validation("registered_name is required".to_string()));
    }

    if !record::valid_tax_type(&payload.tax_type) {
        return Err(ApiError::Validation(
            "tax_type must be vat or non-vat".to_string(),
        ));
    }

    let gross_taxable = parse_amount(&payload.gross_taxable)
        .ok_or_else(|| ApiError::Validation("gross_taxable must be a number".to_string()))?;
    if gross_taxable < Decimal::ZERO {
        return Err(ApiError::Validation(
            "gross_taxable must not be negative".to_string(),
        ));
    }

    let total_actual_amount = match payload.total_actual_amount.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_amount(raw).ok_or_else(|| {
            ApiError::Validation("total_actual_amount must be a number".to_string())
        })?),
        _ => None,
    };

    let pickup_date = match payload.pickup_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(
            |_| ApiError::Validation("pickup_date must be YYYY-MM-DD".to_string()),
        )?),
        _ => None,
    };

    Ok(ParsedRecord {
        tax_month,
        tin,
        gross_taxable,
        total_actual_amount,
        pickup_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payload() -> RecordPayload {
        RecordPayload {
            tax_month: "2024-03-31".to_string(),
            tin: "123-456-789".to_string(),
            registered_name: "Acme Corp".to_string(),
            address_line1: None,
            address_line2: None,
            tax_type: "vat".to_string(),
            sale_type: None,
            category_id: None,
            gross_taxable: "15,000.50".to_string(),
            total_actual_amount: None,
            invoice_number: None,
            pickup_date: None,
        }
    }

    #[test]
    fn accepts_formatted_tin_and_amount() {
        let parsed = validate_record_payload(&payload()).expect("valid payload");
        assert_eq!(parsed.tin, "123456789");
        assert_eq!(parsed.gross_taxable, Decimal::from_str("15000.50").unwrap());
        assert_eq!(
            parsed.tax_month,
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
        );
    }

    #[test]
    fn rejects_negative_gross() {
        let mut p = payload();
        p.gross_taxable = "-1".to_string();
        assert!(validate_record_payload(&p).is_err());
    }

    #[test]
    fn rejects_unknown_tax_type() {
        let mut p = payload();
        p.tax_type = "zero-rated".to_string();
        assert!(validate_record_payload(&p).is_err());
    }

    #[test]
    fn rejects_tin_without_digits() {
        let mut p = payload();
        p.tin = "---".to_string();
        assert!(validate_record_payload(&p).is_err());
    }

    #[test]
    fn optional_amount_must_still_parse() {
        let mut p = payload();
        p.total_actual_amount = Some("abc".to_string());
        assert!(validate_record_payload(&p).is_err());
        p.total_actual_amount = Some("  ".to_string());
        assert!(validate_record_payload(&p).unwrap().total_actual_amount.is_none());
    }
}
