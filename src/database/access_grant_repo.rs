use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{AccessGrantRow, CapabilitySet};

const SQL_INSERT_GRANT: &str = r#"
INSERT INTO access_grants (
  identity_id,
  event_id,
  is_creator,
  can_see_scanned,
  can_create_activity,
  can_create_attendee,
  can_see_attendee,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
"#;

pub struct NewAccessGrant<'a> {
    pub identity_id: &'a str,
    pub event_id: &'a str,
    pub is_creator: bool,
    pub capabilities: CapabilitySet,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_grant<'e>(
    executor: impl SqliteExecutor<'e>,
    grant: NewAccessGrant<'_>,
) -> sqlx::Result<AccessGrantRow> {
    sqlx::query_as::<_, AccessGrantRow>(SQL_INSERT_GRANT)
        .bind(grant.identity_id)
        .bind(grant.event_id)
        .bind(grant.is_creator)
        .bind(grant.capabilities.can_see_scanned)
        .bind(grant.capabilities.can_create_activity)
        .bind(grant.capabilities.can_create_attendee)
        .bind(grant.capabilities.can_see_attendee)
        .bind(grant.created_at)
        .fetch_one(executor)
        .await
}

const SQL_LOAD_GRANT: &str = r#"
SELECT *
FROM access_grants
WHERE identity_id = ?1
  AND event_id = ?2
LIMIT 1
"#;

pub async fn load_grant<'e>(
    executor: impl SqliteExecutor<'e>,
    identity_id: &str,
    event_id: &str,
) -> sqlx::Result<Option<AccessGrantRow>> {
    sqlx::query_as::<_, AccessGrantRow>(SQL_LOAD_GRANT)
        .bind(identity_id)
        .bind(event_id)
        .fetch_optional(executor)
        .await
}

// is_creator is never touched here.
const SQL_UPDATE_CAPABILITIES: &str = r#"
UPDATE access_grants
SET can_see_scanned = ?,
    can_create_activity = ?,
    can_create_attendee = ?,
    can_see_attendee = ?
WHERE identity_id = ?
  AND event_id = ?
RETURNING *
"#;

pub async fn update_capabilities<'e>(
    executor: impl SqliteExecutor<'e>,
    identity_id: &str,
    event_id: &str,
    capabilities: CapabilitySet,
) -> sqlx::Result<Option<AccessGrantRow>> {
    sqlx::query_as::<_, AccessGrantRow>(SQL_UPDATE_CAPABILITIES)
        .bind(capabilities.can_see_scanned)
        .bind(capabilities.can_create_activity)
        .bind(capabilities.can_create_attendee)
        .bind(capabilities.can_see_attendee)
        .bind(identity_id)
        .bind(event_id)
        .fetch_optional(executor)
        .await
}

const SQL_LIST_GRANTS_FOR_EVENT: &str = r#"
SELECT *
FROM access_grants
WHERE event_id = ?1
ORDER BY is_creator DESC, created_at ASC
"#;

pub async fn list_grants_for_event<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Vec<AccessGrantRow>> {
    sqlx::query_as::<_, AccessGrantRow>(SQL_LIST_GRANTS_FOR_EVENT)
        .bind(event_id)
        .fetch_all(executor)
        .await
}

const SQL_LIST_GRANTS_FOR_IDENTITY: &str = r#"
SELECT *
FROM access_grants
WHERE identity_id = ?1
"#;

pub async fn list_grants_for_identity<'e>(
    executor: impl SqliteExecutor<'e>,
    identity_id: &str,
) -> sqlx::Result<Vec<AccessGrantRow>> {
    sqlx::query_as::<_, AccessGrantRow>(SQL_LIST_GRANTS_FOR_IDENTITY)
        .bind(identity_id)
        .fetch_all(executor)
        .await
}
