use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::AttendeeRow;

// Counter row per (event, role). Bumping it never goes backwards, so badge
// numbers are not handed out twice even after deletions.
const SQL_NEXT_SEQUENCE: &str = r#"
INSERT INTO attendee_sequences (event_id, role, last_sequence)
VALUES (?1, ?2, 1)
ON CONFLICT (event_id, role)
DO UPDATE SET last_sequence = last_sequence + 1
RETURNING last_sequence
"#;

pub async fn next_sequence<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
    role: &str,
) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(SQL_NEXT_SEQUENCE)
        .bind(event_id)
        .bind(role)
        .fetch_one(executor)
        .await
}

const SQL_INSERT_ATTENDEE: &str = r#"
INSERT INTO attendees (
  attendee_id,
  event_id,
  full_name,
  organization,
  title,
  image_url,
  role,
  sequence,
  created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
"#;

pub struct NewAttendee<'a> {
    pub attendee_id: &'a str,
    pub event_id: &'a str,
    pub full_name: &'a str,
    pub organization: &'a str,
    pub title: &'a str,
    pub image_url: &'a str,
    pub role: &'a str,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_attendee<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee: NewAttendee<'_>,
) -> sqlx::Result<AttendeeRow> {
    sqlx::query_as::<_, AttendeeRow>(SQL_INSERT_ATTENDEE)
        .bind(attendee.attendee_id)
        .bind(attendee.event_id)
        .bind(attendee.full_name)
        .bind(attendee.organization)
        .bind(attendee.title)
        .bind(attendee.image_url)
        .bind(attendee.role)
        .bind(attendee.sequence)
        .bind(attendee.created_at)
        .fetch_one(executor)
        .await
}

const SQL_LOAD_ATTENDEE: &str = r#"
SELECT *
FROM attendees
WHERE attendee_id = ?1
LIMIT 1
"#;

pub async fn load_attendee<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee_id: &str,
) -> sqlx::Result<Option<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(SQL_LOAD_ATTENDEE)
        .bind(attendee_id)
        .fetch_optional(executor)
        .await
}

const SQL_LIST_ATTENDEES: &str = r#"
SELECT *
FROM attendees
WHERE event_id = ?1
ORDER BY role ASC, sequence ASC
"#;

pub async fn list_attendees<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Vec<AttendeeRow>> {
    sqlx::query_as::<_, AttendeeRow>(SQL_LIST_ATTENDEES)
        .bind(event_id)
        .fetch_all(executor)
        .await
}

const SQL_DELETE_ATTENDEE: &str = r#"
DELETE FROM attendees
WHERE attendee_id = ?1
"#;

pub async fn delete_attendee<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee_id: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_ATTENDEE)
        .bind(attendee_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}
