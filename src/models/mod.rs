pub mod commission;
pub mod record;
pub mod taxpayer;
pub mod user;

// Re-export only the types we actually use
pub use commission::{
    append_status_entry, AgentBreakdown, CommissionReport, HistoryEntry, PotAttachment,
    ReportStatus, StatusUpdatePayload,
};
pub use record::{
    CategoryPayload, OfficialReceipt, PurchaseCategory, PurchaseRecord, RecordPayload,
    RemarkEntry, RemarkPayload, SalesRecord,
};
pub use taxpayer::{
    valid_listing_type, CreateListingPayload, ListingSuggestion, TaxpayerListing,
    UpdateListingPayload,
};
pub use user::{
    CreateUserPayload, Role, UpdateUserPayload, UserProfile, UserResponse, USER_STATUSES,
};
