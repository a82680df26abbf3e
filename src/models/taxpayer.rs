use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Registry entry keyed by (tin, listing_type). TINs are stored as bare
/// digit strings; the same TIN may appear once under "sales" and once
/// under "purchases".
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct TaxpayerListing {
    pub id: Uuid,
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub listing_type: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const LISTING_TYPES: &[&str] = &["sales", "purchases"];

pub fn valid_listing_type(s: &str) -> bool {
    LISTING_TYPES.contains(&s)
}

#[derive(Debug, Deserialize)]
pub struct CreateListingPayload {
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub listing_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingPayload {
    pub tin: Option<String>,
    pub registered_name: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
}

/// Autocomplete row: just enough to fill the name/address fields of a
/// creation form.
#[derive(Debug, Serialize, FromRow)]
pub struct ListingSuggestion {
    pub id: Uuid,
    pub tin: String,
    pub registered_name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
}
