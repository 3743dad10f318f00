use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CheckInStatus {
    Checked,
    Unchecked,
}

impl CheckInStatus {
    pub fn flipped(self) -> Self {
        match self {
            Self::Checked => Self::Unchecked,
            Self::Unchecked => Self::Checked,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CheckInRecordRow {
    pub check_in_id: String,
    pub attendee_id: String,
    pub activity_id: String,
    pub status: CheckInStatus,
    pub scanned_at: DateTime<Utc>,
    pub scanned_by: String,
}

/// Ledger record joined with attendee and activity display fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckInListingRow {
    #[sqlx(flatten)]
    pub record: CheckInRecordRow,
    pub event_id: String,
    pub full_name: String,
    pub organization: String,
    pub role: String,
    pub sequence: i64,
    pub activity_name: String,
}
