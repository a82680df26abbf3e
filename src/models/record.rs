use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub const TAX_TYPES: &[&str] = &["vat", "non-vat"];

pub fn valid_tax_type(s: &str) -> bool {
    TAX_TYPES.contains(&s)
}

/// One entry of a record's remark thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemarkEntry {
    pub remark: String,
    pub name: String,
    pub uuid: Uuid,
    pub date: DateTime<Utc>,
}

/// Purchase receipts keep the original filename next to the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialReceipt {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct SalesRecord {
    pub id: Uuid,
    pub tax_month: NaiveDate,
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub tax_type: String,
    pub sale_type: Option<String>,
    pub gross_taxable: Decimal,
    pub total_actual_amount: Option<Decimal>,
    pub invoice_number: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub cheque: Json<Vec<String>>,
    pub voucher: Json<Vec<String>>,
    pub invoice: Json<Vec<String>>,
    pub doc_2307: Json<Vec<String>>,
    pub deposit_slip: Json<Vec<String>>,
    pub remarks: Json<Vec<RemarkEntry>>,
    pub user_uuid: Option<Uuid>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct PurchaseRecord {
    pub id: Uuid,
    pub tax_month: NaiveDate,
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub tax_type: String,
    pub sale_type: Option<String>,
    pub category_id: Option<Uuid>,
    pub gross_taxable: Decimal,
    pub total_actual_amount: Option<Decimal>,
    pub invoice_number: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub cheque: Json<Vec<String>>,
    pub voucher: Json<Vec<String>>,
    pub invoice: Json<Vec<String>>,
    pub doc_2307: Json<Vec<String>>,
    pub deposit_slip: Json<Vec<String>>,
    pub official_receipt: Json<Vec<OfficialReceipt>>,
    pub remarks: Json<Vec<RemarkEntry>>,
    pub user_uuid: Option<Uuid>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct PurchaseCategory {
    pub id: Uuid,
    pub category: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Create/edit payload shared by sales and purchases. Amounts arrive as
/// the strings the form shows ("15,000.50"); dates as YYYY-MM-DD.
#[derive(Debug, Deserialize)]
pub struct RecordPayload {
    pub tax_month: String,
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub tax_type: String,
    pub sale_type: Option<String>,
    pub category_id: Option<Uuid>,
    pub gross_taxable: String,
    pub total_actual_amount: Option<String>,
    pub invoice_number: Option<String>,
    pub pickup_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemarkPayload {
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub category: String,
}
