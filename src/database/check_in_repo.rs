use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{CheckInListingRow, CheckInRecordRow, CheckInStatus};

const SQL_INSERT_RECORD: &str = r#"
INSERT INTO check_in_records (
  check_in_id,
  attendee_id,
  activity_id,
  status,
  scanned_at,
  scanned_by
) VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
"#;

pub struct NewCheckInRecord<'a> {
    pub check_in_id: &'a str,
    pub attendee_id: &'a str,
    pub activity_id: &'a str,
    pub status: CheckInStatus,
    pub scanned_at: DateTime<Utc>,
    pub scanned_by: &'a str,
}

/// Fails with a unique violation when the (attendee, activity) pair already has a record.
pub async fn insert_record<'e>(
    executor: impl SqliteExecutor<'e>,
    record: NewCheckInRecord<'_>,
) -> sqlx::Result<CheckInRecordRow> {
    sqlx::query_as::<_, CheckInRecordRow>(SQL_INSERT_RECORD)
        .bind(record.check_in_id)
        .bind(record.attendee_id)
        .bind(record.activity_id)
        .bind(record.status)
        .bind(record.scanned_at)
        .bind(record.scanned_by)
        .fetch_one(executor)
        .await
}

// The status guard makes this the only transition out of `unchecked` a scan
// can take; a concurrent scan that already flipped the row leaves zero rows.
const SQL_RECHECK_IF_UNCHECKED: &str = r#"
UPDATE check_in_records
SET status = 'checked',
    scanned_at = ?1,
    scanned_by = ?2
WHERE attendee_id = ?3
  AND activity_id = ?4
  AND status = 'unchecked'
RETURNING *
"#;

pub async fn recheck_if_unchecked<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee_id: &str,
    activity_id: &str,
    scanned_at: DateTime<Utc>,
    scanned_by: &str,
) -> sqlx::Result<Option<CheckInRecordRow>> {
    sqlx::query_as::<_, CheckInRecordRow>(SQL_RECHECK_IF_UNCHECKED)
        .bind(scanned_at)
        .bind(scanned_by)
        .bind(attendee_id)
        .bind(activity_id)
        .fetch_optional(executor)
        .await
}

const SQL_TOGGLE_RECORD: &str = r#"
UPDATE check_in_records
SET status = CASE status WHEN 'checked' THEN 'unchecked' ELSE 'checked' END,
    scanned_at = ?1,
    scanned_by = ?2
WHERE check_in_id = ?3
RETURNING *
"#;

pub async fn toggle_record<'e>(
    executor: impl SqliteExecutor<'e>,
    check_in_id: &str,
    scanned_at: DateTime<Utc>,
    scanned_by: &str,
) -> sqlx::Result<Option<CheckInRecordRow>> {
    sqlx::query_as::<_, CheckInRecordRow>(SQL_TOGGLE_RECORD)
        .bind(scanned_at)
        .bind(scanned_by)
        .bind(check_in_id)
        .fetch_optional(executor)
        .await
}

const SQL_LOAD_RECORD: &str = r#"
SELECT *
FROM check_in_records
WHERE check_in_id = ?1
LIMIT 1
"#;

pub async fn load_record<'e>(
    executor: impl SqliteExecutor<'e>,
    check_in_id: &str,
) -> sqlx::Result<Option<CheckInRecordRow>> {
    sqlx::query_as::<_, CheckInRecordRow>(SQL_LOAD_RECORD)
        .bind(check_in_id)
        .fetch_optional(executor)
        .await
}

const SQL_FIND_RECORD_FOR_PAIR: &str = r#"
SELECT *
FROM check_in_records
WHERE attendee_id = ?1
  AND activity_id = ?2
LIMIT 1
"#;

pub async fn find_record_for_pair<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee_id: &str,
    activity_id: &str,
) -> sqlx::Result<Option<CheckInRecordRow>> {
    sqlx::query_as::<_, CheckInRecordRow>(SQL_FIND_RECORD_FOR_PAIR)
        .bind(attendee_id)
        .bind(activity_id)
        .fetch_optional(executor)
        .await
}

/// Event that owns a check-in record, via its activity.
const SQL_EVENT_OF_RECORD: &str = r#"
SELECT a.event_id
FROM check_in_records c
JOIN activities a ON a.activity_id = c.activity_id
WHERE c.check_in_id = ?1
LIMIT 1
"#;

pub async fn event_of_record<'e>(
    executor: impl SqliteExecutor<'e>,
    check_in_id: &str,
) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar::<_, String>(SQL_EVENT_OF_RECORD)
        .bind(check_in_id)
        .fetch_optional(executor)
        .await
}

macro_rules! listing_select {
    () => {
        r#"
SELECT
  c.check_in_id,
  c.attendee_id,
  c.activity_id,
  c.status,
  c.scanned_at,
  c.scanned_by,
  a.event_id,
  u.full_name,
  u.organization,
  u.role,
  u.sequence,
  a.name AS activity_name
FROM check_in_records c
JOIN attendees u ON u.attendee_id = c.attendee_id
JOIN activities a ON a.activity_id = c.activity_id
"#
    };
}

const SQL_LIST_BY_EVENT: &str = concat!(
    listing_select!(),
    "WHERE a.event_id = ?1\nORDER BY c.scanned_at ASC, c.check_in_id ASC\n"
);

pub async fn list_by_event<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Vec<CheckInListingRow>> {
    sqlx::query_as::<_, CheckInListingRow>(SQL_LIST_BY_EVENT)
        .bind(event_id)
        .fetch_all(executor)
        .await
}

const SQL_LIST_BY_ACTIVITY: &str = concat!(
    listing_select!(),
    "WHERE a.event_id = ?1\n  AND c.activity_id = ?2\nORDER BY c.scanned_at ASC, c.check_in_id ASC\n"
);

pub async fn list_by_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
    activity_id: &str,
) -> sqlx::Result<Vec<CheckInListingRow>> {
    sqlx::query_as::<_, CheckInListingRow>(SQL_LIST_BY_ACTIVITY)
        .bind(event_id)
        .bind(activity_id)
        .fetch_all(executor)
        .await
}

const SQL_LIST_BY_ATTENDEE: &str = concat!(
    listing_select!(),
    "WHERE c.attendee_id = ?1\nORDER BY c.scanned_at ASC, c.check_in_id ASC\n"
);

pub async fn list_by_attendee<'e>(
    executor: impl SqliteExecutor<'e>,
    attendee_id: &str,
) -> sqlx::Result<Vec<CheckInListingRow>> {
    sqlx::query_as::<_, CheckInListingRow>(SQL_LIST_BY_ATTENDEE)
        .bind(attendee_id)
        .fetch_all(executor)
        .await
}
