use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Commission report statuses. The UI speaks snake_case tokens, storage
/// keeps space-separated labels; the two are an explicit lookup in both
/// directions, never a derived string transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    New,
    OngoingVerification,
    ForApproval,
    Approved,
    Cancelled,
    ForTesting,
}

pub const ALL_STATUSES: &[ReportStatus] = &[
    ReportStatus::New,
    ReportStatus::OngoingVerification,
    ReportStatus::ForApproval,
    ReportStatus::Approved,
    ReportStatus::Cancelled,
    ReportStatus::ForTesting,
];

impl ReportStatus {
    pub fn ui_token(&self) -> &'static str {
        match self {
            ReportStatus::New => "new",
            ReportStatus::OngoingVerification => "ongoing_verification",
            ReportStatus::ForApproval => "for_approval",
            ReportStatus::Approved => "approved",
            ReportStatus::Cancelled => "cancelled",
            ReportStatus::ForTesting => "for_testing",
        }
    }

    pub fn storage_label(&self) -> &'static str {
        match self {
            ReportStatus::New => "new",
            ReportStatus::OngoingVerification => "ongoing verification",
            ReportStatus::ForApproval => "for approval",
            ReportStatus::Approved => "approved",
            ReportStatus::Cancelled => "cancelled",
            ReportStatus::ForTesting => "for testing",
        }
    }

    pub fn from_ui_token(s: &str) -> Option<ReportStatus> {
        match s {
            "new" => Some(ReportStatus::New),
            "ongoing_verification" => Some(ReportStatus::OngoingVerification),
            "for_approval" => Some(ReportStatus::ForApproval),
            "approved" => Some(ReportStatus::Approved),
            "cancelled" => Some(ReportStatus::Cancelled),
            "for_testing" => Some(ReportStatus::ForTesting),
            _ => None,
        }
    }

    pub fn from_storage_label(s: &str) -> Option<ReportStatus> {
        match s {
            "new" => Some(ReportStatus::New),
            "ongoing verification" => Some(ReportStatus::OngoingVerification),
            "for approval" => Some(ReportStatus::ForApproval),
            "approved" => Some(ReportStatus::Approved),
            "cancelled" => Some(ReportStatus::Cancelled),
            "for testing" => Some(ReportStatus::ForTesting),
            _ => None,
        }
    }
}

/// Append-only audit entry on a report. Existing entries are never
/// rewritten; status updates push a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub remarks: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Accounting attachment stored on the report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotAttachment {
    pub name: String,
    pub url: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct CommissionReport {
    pub uuid: Uuid,
    pub report_number: String,
    pub sales_uuids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub status: String,
    pub remarks: Option<String>,
    pub accounting_pot: Json<Vec<PotAttachment>>,
    pub history: Json<Vec<HistoryEntry>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-report commission line, read-only here.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct AgentBreakdown {
    pub id: Uuid,
    pub report_uuid: Uuid,
    pub beneficiary: String,
    pub beneficiary_role: String,
    pub commission_amount: Decimal,
    pub vat: Decimal,
    pub ewt: Decimal,
    pub net_commission: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: String,
    pub remarks: Option<String>,
}

/// Append a status-update entry. Existing entries pass through untouched.
pub fn append_status_entry(
    mut history: Vec<HistoryEntry>,
    status: ReportStatus,
    remarks: &str,
    user_id: Uuid,
    user_name: &str,
) -> Vec<HistoryEntry> {
    history.push(HistoryEntry {
        action: "status_update".to_string(),
        remarks: remarks.to_string(),
        user_id,
        user_name: user_name.to_string(),
        timestamp: Utc::now(),
        status: Some(status.storage_label().to_string()),
    });
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_mapping_is_a_closed_bijection() {
        for status in ALL_STATUSES {
            assert_eq!(ReportStatus::from_ui_token(status.ui_token()), Some(*status));
            assert_eq!(
                ReportStatus::from_storage_label(status.storage_label()),
                Some(*status)
            );
        }
        assert_eq!(ReportStatus::from_ui_token("ongoing verification"), None);
        assert_eq!(ReportStatus::from_storage_label("ongoing_verification"), None);
        assert_eq!(ReportStatus::from_ui_token("archived"), None);
    }

    #[test]
    fn history_is_append_only_and_tracks_status() {
        let user_id = Uuid::new_v4();
        let mut history = Vec::new();
        for (i, status) in [
            ReportStatus::OngoingVerification,
            ReportStatus::ForApproval,
            ReportStatus::Approved,
        ]
        .into_iter()
        .enumerate()
        {
            let before = history.clone();
            history = append_status_entry(history, status, "checked", user_id, "Jane Cruz");
            assert_eq!(history.len(), i + 1);
            // earlier entries are untouched
            for (old, new) in before.iter().zip(history.iter()) {
                assert_eq!(old.status, new.status);
                assert_eq!(old.remarks, new.remarks);
            }
            let last = history.last().unwrap();
            assert_eq!(last.action, "status_update");
            assert_eq!(last.status.as_deref(), Some(status.storage_label()));
            assert_eq!(last.user_id, user_id);
        }
    }

    #[test]
    fn ui_and_storage_forms_differ_only_where_enumerated() {
        assert_eq!(ReportStatus::OngoingVerification.storage_label(), "ongoing verification");
        assert_eq!(ReportStatus::ForApproval.storage_label(), "for approval");
        assert_eq!(ReportStatus::ForTesting.storage_label(), "for testing");
        assert_eq!(ReportStatus::New.storage_label(), "new");
    }
}
