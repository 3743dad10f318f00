use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{EventRow, EventWithCountRow};

const SQL_INSERT_EVENT: &str = r#"
INSERT INTO events (
  event_id,
  name,
  description,
  start_time,
  end_time,
  location,
  staff_code,
  admin_code,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
"#;

pub struct NewEvent<'a> {
    pub event_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: &'a str,
    pub staff_code: &'a str,
    pub admin_code: &'a str,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_event<'e>(
    executor: impl SqliteExecutor<'e>,
    event: NewEvent<'_>,
) -> sqlx::Result<EventRow> {
    sqlx::query_as::<_, EventRow>(SQL_INSERT_EVENT)
        .bind(event.event_id)
        .bind(event.name)
        .bind(event.description)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.location)
        .bind(event.staff_code)
        .bind(event.admin_code)
        .bind(event.created_at)
        .fetch_one(executor)
        .await
}

const SQL_LOAD_EVENT: &str = r#"
SELECT *
FROM events
WHERE event_id = ?1
LIMIT 1
"#;

pub async fn load_event<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Option<EventRow>> {
    sqlx::query_as::<_, EventRow>(SQL_LOAD_EVENT)
        .bind(event_id)
        .fetch_optional(executor)
        .await
}

// Raw counts only; capability checks happen in the visibility service.
const SQL_LOAD_EVENT_WITH_COUNT: &str = r#"
SELECT
  e.*,
  (SELECT COUNT(*) FROM attendees u WHERE u.event_id = e.event_id) AS participant_count
FROM events e
WHERE e.event_id = ?1
LIMIT 1
"#;

pub async fn load_event_with_count<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Option<EventWithCountRow>> {
    sqlx::query_as::<_, EventWithCountRow>(SQL_LOAD_EVENT_WITH_COUNT)
        .bind(event_id)
        .fetch_optional(executor)
        .await
}

const SQL_LIST_EVENTS_FOR_IDENTITY: &str = r#"
SELECT
  e.*,
  (SELECT COUNT(*) FROM attendees u WHERE u.event_id = e.event_id) AS participant_count
FROM events e
JOIN access_grants g
  ON g.event_id = e.event_id
WHERE g.identity_id = ?1
ORDER BY e.start_time ASC
"#;

pub async fn list_events_for_identity<'e>(
    executor: impl SqliteExecutor<'e>,
    identity_id: &str,
) -> sqlx::Result<Vec<EventWithCountRow>> {
    sqlx::query_as::<_, EventWithCountRow>(SQL_LIST_EVENTS_FOR_IDENTITY)
        .bind(identity_id)
        .fetch_all(executor)
        .await
}

const SQL_FIND_BY_STAFF_CODE: &str = r#"
SELECT *
FROM events
WHERE staff_code = ?1
LIMIT 1
"#;

pub async fn find_by_staff_code<'e>(
    executor: impl SqliteExecutor<'e>,
    code: &str,
) -> sqlx::Result<Option<EventRow>> {
    sqlx::query_as::<_, EventRow>(SQL_FIND_BY_STAFF_CODE)
        .bind(code)
        .fetch_optional(executor)
        .await
}

const SQL_FIND_BY_ADMIN_CODE: &str = r#"
SELECT *
FROM events
WHERE admin_code = ?1
LIMIT 1
"#;

pub async fn find_by_admin_code<'e>(
    executor: impl SqliteExecutor<'e>,
    code: &str,
) -> sqlx::Result<Option<EventRow>> {
    sqlx::query_as::<_, EventRow>(SQL_FIND_BY_ADMIN_CODE)
        .bind(code)
        .fetch_optional(executor)
        .await
}

const SQL_UPDATE_EVENT_DETAILS: &str = r#"
UPDATE events
SET name = ?,
    description = ?,
    start_time = ?,
    end_time = ?,
    location = ?
WHERE event_id = ?
RETURNING *
"#;

pub struct EventDetails<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: &'a str,
}

pub async fn update_event_details<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
    details: EventDetails<'_>,
) -> sqlx::Result<Option<EventRow>> {
    sqlx::query_as::<_, EventRow>(SQL_UPDATE_EVENT_DETAILS)
        .bind(details.name)
        .bind(details.description)
        .bind(details.start_time)
        .bind(details.end_time)
        .bind(details.location)
        .bind(event_id)
        .fetch_optional(executor)
        .await
}

const SQL_DELETE_EVENT: &str = r#"
DELETE FROM events
WHERE event_id = ?1
"#;

pub async fn delete_event<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_EVENT)
        .bind(event_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}
