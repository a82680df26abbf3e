//! Area-scoped record visibility.
//!
//! Secretaries only see records whose owning user shares their assigned
//! area. The owner's area lives on the profile row, not on the record, so
//! scoping runs as a second pass over a fetched record set: collect the
//! distinct owner ids, load those profiles in one query, attach each
//! owner's area, and drop records that don't match. Every listing page
//! goes through this module; there is no per-page variant.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{database::Database, middleware::CurrentUser, models::Role};

/// What a user is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaScope {
    /// No restriction.
    All,
    /// Only records owned by users assigned to this area.
    Area(String),
    /// A secretary without an assigned area sees nothing. The listing
    /// response carries a flag so the UI can show its "no assigned area"
    /// state instead of an error banner.
    NoArea,
}

impl AreaScope {
    pub fn is_no_area(&self) -> bool {
        matches!(self, AreaScope::NoArea)
    }
}

/// Anything that belongs to a user and can be area-scoped.
pub trait OwnedRecord {
    fn owner_id(&self) -> Option<Uuid>;
}

impl OwnedRecord for crate::models::SalesRecord {
    fn owner_id(&self) -> Option<Uuid> {
        self.user_uuid
    }
}

impl OwnedRecord for crate::models::PurchaseRecord {
    fn owner_id(&self) -> Option<Uuid> {
        self.user_uuid
    }
}

impl OwnedRecord for crate::models::TaxpayerListing {
    fn owner_id(&self) -> Option<Uuid> {
        self.created_by
    }
}

impl OwnedRecord for crate::models::CommissionReport {
    fn owner_id(&self) -> Option<Uuid> {
        self.created_by
    }
}

/// Resolve the scope for a user. `requested_area` is the explicit area
/// filter a super admin may pick in the UI; it is ignored for everyone
/// else.
pub fn resolve_scope(user: &CurrentUser, requested_area: Option<&str>) -> AreaScope {
    match user.role {
        Role::SuperAdmin => match requested_area {
            Some(area) if !area.trim().is_empty() => AreaScope::Area(area.trim().to_string()),
            _ => AreaScope::All,
        },
        Role::Admin => AreaScope::All,
        Role::Secretary => match user.assigned_area.as_deref() {
            Some(area) if !area.trim().is_empty() => AreaScope::Area(area.to_string()),
            _ => AreaScope::NoArea,
        },
    }
}

/// Apply an [`AreaScope`] to a fetched record set.
pub async fn filter_by_scope<T: OwnedRecord>(
    db: &Database,
    records: Vec<T>,
    scope: &AreaScope,
) -> Result<Vec<T>, sqlx::Error> {
    let area = match scope {
        AreaScope::All => return Ok(records),
        AreaScope::NoArea => return Ok(Vec::new()),
        AreaScope::Area(area) => area,
    };

    let owner_ids: Vec<Uuid> = records
        .iter()
        .filter_map(|r| r.owner_id())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    if owner_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<(Uuid, Option<String>)> =
        sqlx::query_as("SELECT id, assigned_area FROM user_profiles WHERE id = ANY($1)")
            .bind(&owner_ids)
            .fetch_all(db)
            .await?;

    let areas: HashMap<Uuid, Option<String>> = rows.into_iter().collect();

    Ok(retain_matching(records, &areas, area))
}

/// A record stays visible only when its owner is known and assigned to
/// the required area. Unknown owners and owners without an area drop out.
fn retain_matching<T: OwnedRecord>(
    records: Vec<T>,
    owner_areas: &HashMap<Uuid, Option<String>>,
    required_area: &str,
) -> Vec<T> {
    records
        .into_iter()
        .filter(|r| {
            r.owner_id()
                .and_then(|id| owner_areas.get(&id).cloned().flatten())
                .map(|area| area == required_area)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec {
        owner: Option<Uuid>,
    }

    impl OwnedRecord for Rec {
        fn owner_id(&self) -> Option<Uuid> {
            self.owner
        }
    }

    fn user(role: Role, area: Option<&str>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "x@example.com".into(),
            full_name: "Test User".into(),
            role,
            assigned_area: area.map(|a| a.to_string()),
        }
    }

    #[test]
    fn super_admin_sees_all_unless_narrowed() {
        let u = user(Role::SuperAdmin, None);
        assert_eq!(resolve_scope(&u, None), AreaScope::All);
        assert_eq!(resolve_scope(&u, Some("  ")), AreaScope::All);
        assert_eq!(resolve_scope(&u, Some("Cebu")), AreaScope::Area("Cebu".into()));
    }

    #[test]
    fn admin_ignores_area_filter() {
        let u = user(Role::Admin, Some("Davao"));
        assert_eq!(resolve_scope(&u, Some("Cebu")), AreaScope::All);
    }

    #[test]
    fn secretary_is_pinned_to_own_area() {
        let u = user(Role::Secretary, Some("Cebu"));
        assert_eq!(resolve_scope(&u, Some("Davao")), AreaScope::Area("Cebu".into()));
    }

    #[test]
    fn secretary_without_area_is_locked_out() {
        assert_eq!(resolve_scope(&user(Role::Secretary, None), None), AreaScope::NoArea);
        assert_eq!(resolve_scope(&user(Role::Secretary, Some("")), None), AreaScope::NoArea);
        assert!(resolve_scope(&user(Role::Secretary, None), None).is_no_area());
    }

    #[test]
    fn retains_only_matching_owner_areas() {
        let cebu_owner = Uuid::new_v4();
        let davao_owner = Uuid::new_v4();
        let areless_owner = Uuid::new_v4();
        let unknown_owner = Uuid::new_v4();

        let mut areas = HashMap::new();
        areas.insert(cebu_owner, Some("Cebu".to_string()));
        areas.insert(davao_owner, Some("Davao".to_string()));
        areas.insert(areless_owner, None);

        let records = vec![
            Rec { owner: Some(cebu_owner) },
            Rec { owner: Some(davao_owner) },
            Rec { owner: Some(areless_owner) },
            Rec { owner: Some(unknown_owner) },
            Rec { owner: None },
        ];

        let kept = retain_matching(records, &areas, "Cebu");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].owner, Some(cebu_owner));
    }
}
