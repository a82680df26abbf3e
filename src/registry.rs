//! Taxpayer registry lookups shared by the sales and purchase flows.

use uuid::Uuid;

use crate::{database::Database, error::ApiError, utils::normalize_tin};

pub struct ListingInput<'a> {
    pub tin: &'a str,
    pub registered_name: &'a str,
    pub address_line1: Option<&'a str>,
    pub address_line2: Option<&'a str>,
    /// "sales" or "purchases"
    pub listing_type: &'a str,
}

/// Resolve a (TIN, type) pair to a registry id, inserting the listing on
/// first use. Existing rows are returned untouched: address data is never
/// refreshed from a later submission.
///
/// The lookup and insert are two statements, not a transaction. A failure
/// between the insert here and the caller's record insert leaves a registry
/// row with no owning record; that row is simply reused by the next
/// submission of the same TIN.
pub async fn get_or_create_listing(
    db: &Database,
    input: &ListingInput<'_>,
    user_id: Uuid,
) -> Result<Uuid, ApiError> {
    let tin = normalize_tin(input.tin);
    if tin.is_empty() {
        return Err(ApiError::Validation(
            "TIN must contain at least one digit".to_string(),
        ));
    }

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM taxpayer_listings WHERE tin = $1 AND listing_type = $2")
            .bind(&tin)
            .bind(input.listing_type)
            .fetch_optional(db)
            .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO taxpayer_listings (tin, registered_name, address_line1, address_line2, listing_type, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&tin)
    .bind(input.registered_name)
    .bind(input.address_line1)
    .bind(input.address_line2)
    .bind(input.listing_type)
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(id)
}
