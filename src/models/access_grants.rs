use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccessGrantRow {
    pub identity_id: String,
    pub event_id: String,
    pub is_creator: bool,
    pub can_see_scanned: bool,
    pub can_create_activity: bool,
    pub can_create_attendee: bool,
    pub can_see_attendee: bool,
    pub created_at: DateTime<Utc>,
}

/// The four independently grantable bits; `is_creator` is not one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub can_see_scanned: bool,
    #[serde(default)]
    pub can_create_activity: bool,
    #[serde(default)]
    pub can_create_attendee: bool,
    #[serde(default)]
    pub can_see_attendee: bool,
}

impl CapabilitySet {
    pub const NONE: Self = Self {
        can_see_scanned: false,
        can_create_activity: false,
        can_create_attendee: false,
        can_see_attendee: false,
    };

    pub const ALL: Self = Self {
        can_see_scanned: true,
        can_create_activity: true,
        can_create_attendee: true,
        can_see_attendee: true,
    };
}
