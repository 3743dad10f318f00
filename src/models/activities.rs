use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityRow {
    pub activity_id: String,
    pub event_id: String,
    pub name: String,
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Activity row plus the raw number of `checked` records, before redaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityWithCountRow {
    #[sqlx(flatten)]
    pub activity: ActivityRow,
    pub scanned_count: i64,
}
