use serde::{Serialize, Serializer};
use sqlx::SqlitePool;

use crate::database::access_grant_repo;
use crate::error::AppResult;
use crate::models::AccessGrantRow;
use crate::services::access_control_service::{grant_allows, Capability};

/// A value the requester may or may not be allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redacted<T> {
    Visible(T),
    Hidden,
}

impl<T> Redacted<T> {
    pub fn visible_if(allowed: bool, value: T) -> Self {
        if allowed {
            Self::Visible(value)
        } else {
            Self::Hidden
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }

    pub fn visible(&self) -> Option<&T> {
        match self {
            Self::Visible(v) => Some(v),
            Self::Hidden => None,
        }
    }
}

/// Wire sentinel for a hidden count.
pub const HIDDEN_COUNT: i64 = -1;

impl Redacted<i64> {
    pub fn wire_count(&self) -> i64 {
        match self {
            Self::Visible(n) => *n,
            Self::Hidden => HIDDEN_COUNT,
        }
    }
}

// Hidden serializes as null so list-shaped fields keep their key.
impl<T: Serialize> Serialize for Redacted<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Visible(v) => serializer.serialize_some(v),
            Self::Hidden => serializer.serialize_none(),
        }
    }
}

/// `serialize_with` helper for count fields: hidden becomes `-1`.
pub fn serialize_count<S: Serializer>(
    value: &Redacted<i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.wire_count())
}

/// What one requester may see on one event. Built once per request from the
/// requester's grant; every count or list leaving the core passes through it.
#[derive(Debug, Clone)]
pub struct Visibility {
    grant: Option<AccessGrantRow>,
}

impl Visibility {
    pub async fn for_requester(
        pool: &SqlitePool,
        identity_id: &str,
        event_id: &str,
    ) -> AppResult<Self> {
        let grant = access_grant_repo::load_grant(pool, identity_id, event_id).await?;
        Ok(Self::from_grant(grant))
    }

    pub fn from_grant(grant: Option<AccessGrantRow>) -> Self {
        Self { grant }
    }

    fn allows(&self, capability: Capability) -> bool {
        grant_allows(self.grant.as_ref(), capability)
    }

    pub fn is_creator(&self) -> bool {
        self.grant.as_ref().map(|g| g.is_creator).unwrap_or(false)
    }

    pub fn participant_count(&self, raw: i64) -> Redacted<i64> {
        Redacted::visible_if(self.allows(Capability::SeeAttendee), raw)
    }

    pub fn scanned_count(&self, raw: i64) -> Redacted<i64> {
        Redacted::visible_if(self.allows(Capability::SeeScanned), raw)
    }

    pub fn attendees<T>(&self, rows: Vec<T>) -> Redacted<Vec<T>> {
        Redacted::visible_if(self.allows(Capability::SeeAttendee), rows)
    }

    /// Staff join code, for the creator only. The admin code has no read path.
    pub fn staff_code(&self, code: &str) -> Option<String> {
        self.is_creator().then(|| code.to_string())
    }
}
