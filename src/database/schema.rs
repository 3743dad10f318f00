use sqlx::SqlitePool;
use tracing::debug;

// Applied in order at startup. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS events (
  event_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT NOT NULL DEFAULT '',
  start_time TEXT NOT NULL,
  end_time TEXT NOT NULL,
  location TEXT NOT NULL DEFAULT '',
  staff_code TEXT NOT NULL UNIQUE,
  admin_code TEXT NOT NULL UNIQUE,
  created_at TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activities (
  activity_id TEXT PRIMARY KEY,
  event_id TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  kind TEXT NOT NULL DEFAULT '',
  start_time TEXT NOT NULL,
  end_time TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS attendees (
  attendee_id TEXT PRIMARY KEY,
  event_id TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
  full_name TEXT NOT NULL,
  organization TEXT NOT NULL,
  title TEXT NOT NULL,
  image_url TEXT NOT NULL,
  role TEXT NOT NULL,
  sequence INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE (event_id, role, sequence)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS attendee_sequences (
  event_id TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
  role TEXT NOT NULL,
  last_sequence INTEGER NOT NULL,
  PRIMARY KEY (event_id, role)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS access_grants (
  identity_id TEXT NOT NULL,
  event_id TEXT NOT NULL REFERENCES events(event_id) ON DELETE CASCADE,
  is_creator INTEGER NOT NULL DEFAULT 0,
  can_see_scanned INTEGER NOT NULL DEFAULT 0,
  can_create_activity INTEGER NOT NULL DEFAULT 0,
  can_create_attendee INTEGER NOT NULL DEFAULT 0,
  can_see_attendee INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  PRIMARY KEY (identity_id, event_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS check_in_records (
  check_in_id TEXT PRIMARY KEY,
  attendee_id TEXT NOT NULL REFERENCES attendees(attendee_id) ON DELETE CASCADE,
  activity_id TEXT NOT NULL REFERENCES activities(activity_id) ON DELETE CASCADE,
  status TEXT NOT NULL CHECK (status IN ('checked', 'unchecked')),
  scanned_at TEXT NOT NULL,
  scanned_by TEXT NOT NULL,
  UNIQUE (attendee_id, activity_id)
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_activities_event ON activities(event_id)",
    "CREATE INDEX IF NOT EXISTS idx_attendees_event ON attendees(event_id)",
    "CREATE INDEX IF NOT EXISTS idx_access_grants_event ON access_grants(event_id)",
    "CREATE INDEX IF NOT EXISTS idx_check_in_records_activity ON check_in_records(activity_id)",
];

pub async fn migrate(pool: &SqlitePool) -> sqlx::Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "schema applied");
    Ok(())
}
