use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::database::check_in_repo;
use crate::error::AppResult;
use crate::identity::IdentityContext;
use crate::models::attendees::badge_id;
use crate::models::{CheckInListingRow, CheckInStatus};
use crate::services::access_control_service;
use crate::services::event_catalog_service;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub badge_id: String,
    pub full_name: String,
    pub organization: String,
    pub activity_name: String,
    pub scanned_at_local: String,
    pub scanned_by: String,
    pub status: CheckInStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInExport {
    pub event_id: String,
    pub utc_offset_minutes: i32,
    pub rows: Vec<ExportRow>,
}

/// Creator-only dump of every check-in in an event, timestamps shifted to `offset`.
pub async fn export_check_ins(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    offset: FixedOffset,
) -> AppResult<CheckInExport> {
    event_catalog_service::load_event(pool, event_id).await?;
    access_control_service::require_creator(pool, identity, event_id).await?;

    let rows: Vec<ExportRow> = check_in_repo::list_by_event(pool, event_id)
        .await?
        .into_iter()
        .map(|row| export_row(row, offset))
        .collect();

    info!(event_id = %event_id, rows = rows.len(), "check-ins exported");

    Ok(CheckInExport {
        event_id: event_id.to_string(),
        utc_offset_minutes: offset.local_minus_utc() / 60,
        rows,
    })
}

fn export_row(row: CheckInListingRow, offset: FixedOffset) -> ExportRow {
    ExportRow {
        badge_id: badge_id(&row.role, row.sequence),
        full_name: row.full_name,
        organization: row.organization,
        activity_name: row.activity_name,
        scanned_at_local: format_local(row.record.scanned_at, offset),
        scanned_by: row.record.scanned_by,
        status: row.record.status,
    }
}

pub fn format_local(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format(LOCAL_TIME_FORMAT).to_string()
}
