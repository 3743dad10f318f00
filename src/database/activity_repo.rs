use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::{ActivityRow, ActivityWithCountRow};

const SQL_INSERT_ACTIVITY: &str = r#"
INSERT INTO activities (
  activity_id,
  event_id,
  name,
  kind,
  start_time,
  end_time
) VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
"#;

pub struct NewActivity<'a> {
    pub activity_id: &'a str,
    pub event_id: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub async fn insert_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    activity: NewActivity<'_>,
) -> sqlx::Result<ActivityRow> {
    sqlx::query_as::<_, ActivityRow>(SQL_INSERT_ACTIVITY)
        .bind(activity.activity_id)
        .bind(activity.event_id)
        .bind(activity.name)
        .bind(activity.kind)
        .bind(activity.start_time)
        .bind(activity.end_time)
        .fetch_one(executor)
        .await
}

const SQL_LOAD_ACTIVITY: &str = r#"
SELECT *
FROM activities
WHERE activity_id = ?1
LIMIT 1
"#;

pub async fn load_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    activity_id: &str,
) -> sqlx::Result<Option<ActivityRow>> {
    sqlx::query_as::<_, ActivityRow>(SQL_LOAD_ACTIVITY)
        .bind(activity_id)
        .fetch_optional(executor)
        .await
}

const SQL_UPDATE_ACTIVITY: &str = r#"
UPDATE activities
SET name = ?1,
    kind = ?2,
    start_time = ?3,
    end_time = ?4
WHERE activity_id = ?5
RETURNING *
"#;

pub struct ActivityDetails<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// The owning event never changes; only descriptive fields are written.
pub async fn update_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    activity_id: &str,
    details: ActivityDetails<'_>,
) -> sqlx::Result<Option<ActivityRow>> {
    sqlx::query_as::<_, ActivityRow>(SQL_UPDATE_ACTIVITY)
        .bind(details.name)
        .bind(details.kind)
        .bind(details.start_time)
        .bind(details.end_time)
        .bind(activity_id)
        .fetch_optional(executor)
        .await
}

// Raw scanned counts; the visibility service decides who may see them.
const SQL_LIST_ACTIVITIES_WITH_COUNTS: &str = r#"
SELECT
  a.*,
  (
    SELECT COUNT(*)
    FROM check_in_records c
    WHERE c.activity_id = a.activity_id
      AND c.status = 'checked'
  ) AS scanned_count
FROM activities a
WHERE a.event_id = ?1
ORDER BY a.start_time ASC, a.name ASC
"#;

pub async fn list_activities_with_counts<'e>(
    executor: impl SqliteExecutor<'e>,
    event_id: &str,
) -> sqlx::Result<Vec<ActivityWithCountRow>> {
    sqlx::query_as::<_, ActivityWithCountRow>(SQL_LIST_ACTIVITIES_WITH_COUNTS)
        .bind(event_id)
        .fetch_all(executor)
        .await
}

const SQL_DELETE_ACTIVITY: &str = r#"
DELETE FROM activities
WHERE activity_id = ?1
"#;

pub async fn delete_activity<'e>(
    executor: impl SqliteExecutor<'e>,
    activity_id: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_ACTIVITY)
        .bind(activity_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}
