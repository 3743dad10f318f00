use chrono::{DateTime, Utc};

// Not Serialize: carries both join codes. Read paths go through EventView.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub event_id: String,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub staff_code: String,
    pub admin_code: String,
    pub created_at: DateTime<Utc>,
}

/// Event row plus the raw participant count, before redaction.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventWithCountRow {
    #[sqlx(flatten)]
    pub event: EventRow,
    pub participant_count: i64,
}
