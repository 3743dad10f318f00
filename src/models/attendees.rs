use chrono::{DateTime, Utc};
use serde::Serialize;

// An event-scoped user; `sequence` is unique per (event, role).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendeeRow {
    pub attendee_id: String,
    pub event_id: String,
    pub full_name: String,
    pub organization: String,
    pub title: String,
    pub image_url: String,
    pub role: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl AttendeeRow {
    /// Human-readable badge id, e.g. `staff-12`.
    pub fn badge_id(&self) -> String {
        badge_id(&self.role, self.sequence)
    }
}

pub fn badge_id(role: &str, sequence: i64) -> String {
    format!("{}-{}", role, sequence)
}
