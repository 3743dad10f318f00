use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::{activity_repo, attendee_repo, check_in_repo};
use crate::error::{is_foreign_key_violation, is_unique_violation, AppError, AppResult};
use crate::identity::IdentityContext;
use crate::models::attendees::badge_id;
use crate::models::{CheckInListingRow, CheckInRecordRow, CheckInStatus};
use crate::services::access_control_service::{self, Capability};

/// Which branch of the scan state machine ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Created,
    Rechecked,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub outcome: ScanOutcome,
    pub record: CheckInRecordRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInView {
    pub check_in_id: String,
    pub attendee_id: String,
    pub activity_id: String,
    pub event_id: String,
    pub status: CheckInStatus,
    pub scanned_at: DateTime<Utc>,
    pub scanned_by: String,
    pub badge_id: String,
    pub full_name: String,
    pub organization: String,
    pub activity_name: String,
}

impl From<CheckInListingRow> for CheckInView {
    fn from(row: CheckInListingRow) -> Self {
        Self {
            badge_id: badge_id(&row.role, row.sequence),
            check_in_id: row.record.check_in_id,
            attendee_id: row.record.attendee_id,
            activity_id: row.record.activity_id,
            event_id: row.event_id,
            status: row.record.status,
            scanned_at: row.record.scanned_at,
            scanned_by: row.record.scanned_by,
            full_name: row.full_name,
            organization: row.organization,
            activity_name: row.activity_name,
        }
    }
}

/// Records a badge scan.
///
/// Absent creates a `checked` record, `unchecked` goes back to `checked`, and
/// `checked` is a conflict that leaves the record untouched.
pub async fn scan(
    pool: &SqlitePool,
    actor: &IdentityContext,
    attendee_id: &str,
    activity_id: &str,
) -> AppResult<ScanResult> {
    let Some(attendee) = attendee_repo::load_attendee(pool, attendee_id).await? else {
        return Err(AppError::not_found(format!("attendee {} not found", attendee_id)));
    };
    let Some(activity) = activity_repo::load_activity(pool, activity_id).await? else {
        return Err(AppError::not_found(format!("activity {} not found", activity_id)));
    };
    if attendee.event_id != activity.event_id {
        return Err(AppError::invalid(
            "attendee and activity belong to different events",
        ));
    }

    let now = Utc::now();
    let check_in_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;
    let inserted = check_in_repo::insert_record(
        &mut *tx,
        check_in_repo::NewCheckInRecord {
            check_in_id: &check_in_id,
            attendee_id,
            activity_id,
            status: CheckInStatus::Checked,
            scanned_at: now,
            scanned_by: &actor.id,
        },
    )
    .await;

    let result = match inserted {
        Ok(record) => ScanResult {
            outcome: ScanOutcome::Created,
            record,
        },
        Err(e) if is_unique_violation(&e) => {
            debug!(attendee_id, activity_id, "record exists, trying recheck");
            let rechecked = check_in_repo::recheck_if_unchecked(
                &mut *tx,
                attendee_id,
                activity_id,
                now,
                &actor.id,
            )
            .await?;
            match rechecked {
                Some(record) => ScanResult {
                    outcome: ScanOutcome::Rechecked,
                    record,
                },
                None => {
                    tx.rollback().await?;
                    warn!(
                        attendee_id,
                        activity_id,
                        actor = %actor.id,
                        "duplicate scan rejected"
                    );
                    return Err(AppError::Conflict(format!(
                        "attendee {} is already checked in to activity {}",
                        attendee_id, activity_id
                    )));
                }
            }
        }
        Err(e) if is_foreign_key_violation(&e) => {
            // Attendee or activity deleted after the lookups above.
            warn!(attendee_id, activity_id, "scan target vanished before insert");
            return Err(AppError::not_found(format!(
                "attendee {} or activity {} no longer exists",
                attendee_id, activity_id
            )));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    info!(
        check_in_id = %result.record.check_in_id,
        attendee_id,
        activity_id,
        actor = %actor.id,
        outcome = ?result.outcome,
        "scan recorded"
    );
    Ok(result)
}

/// Flips a record's status and stamps the actor and time. Never conflicts.
pub async fn toggle(
    pool: &SqlitePool,
    actor: &IdentityContext,
    check_in_id: &str,
) -> AppResult<CheckInRecordRow> {
    let event_id = event_of(pool, check_in_id).await?;
    access_control_service::require_capability(pool, actor, &event_id, Capability::SeeScanned)
        .await?;

    let record = check_in_repo::toggle_record(pool, check_in_id, Utc::now(), &actor.id)
        .await?
        .ok_or_else(|| record_not_found(check_in_id))?;

    info!(
        check_in_id,
        status = ?record.status,
        actor = %actor.id,
        "check-in toggled"
    );
    Ok(record)
}

pub async fn get(
    pool: &SqlitePool,
    actor: &IdentityContext,
    check_in_id: &str,
) -> AppResult<CheckInRecordRow> {
    let event_id = event_of(pool, check_in_id).await?;
    access_control_service::require_capability(pool, actor, &event_id, Capability::SeeScanned)
        .await?;

    check_in_repo::load_record(pool, check_in_id)
        .await?
        .ok_or_else(|| record_not_found(check_in_id))
}

/// Id of the record for this pair, if the attendee was ever scanned there.
pub async fn exists_for(
    pool: &SqlitePool,
    actor: &IdentityContext,
    attendee_id: &str,
    activity_id: &str,
) -> AppResult<String> {
    let Some(activity) = activity_repo::load_activity(pool, activity_id).await? else {
        return Err(AppError::not_found(format!("activity {} not found", activity_id)));
    };
    access_control_service::require_capability(
        pool,
        actor,
        &activity.event_id,
        Capability::SeeScanned,
    )
    .await?;

    check_in_repo::find_record_for_pair(pool, attendee_id, activity_id)
        .await?
        .map(|r| r.check_in_id)
        .ok_or_else(|| {
            AppError::not_found(format!(
                "no check-in for attendee {} at activity {}",
                attendee_id, activity_id
            ))
        })
}

pub async fn list_by_event(
    pool: &SqlitePool,
    actor: &IdentityContext,
    event_id: &str,
) -> AppResult<Vec<CheckInView>> {
    access_control_service::require_capability(pool, actor, event_id, Capability::SeeScanned)
        .await?;
    let rows = check_in_repo::list_by_event(pool, event_id).await?;
    Ok(rows.into_iter().map(CheckInView::from).collect())
}

pub async fn list_by_activity(
    pool: &SqlitePool,
    actor: &IdentityContext,
    event_id: &str,
    activity_id: &str,
) -> AppResult<Vec<CheckInView>> {
    access_control_service::require_capability(pool, actor, event_id, Capability::SeeScanned)
        .await?;
    let rows = check_in_repo::list_by_activity(pool, event_id, activity_id).await?;
    Ok(rows.into_iter().map(CheckInView::from).collect())
}

pub async fn list_by_attendee(
    pool: &SqlitePool,
    actor: &IdentityContext,
    attendee_id: &str,
) -> AppResult<Vec<CheckInView>> {
    let Some(attendee) = attendee_repo::load_attendee(pool, attendee_id).await? else {
        return Err(AppError::not_found(format!("attendee {} not found", attendee_id)));
    };
    access_control_service::require_capability(
        pool,
        actor,
        &attendee.event_id,
        Capability::SeeScanned,
    )
    .await?;
    let rows = check_in_repo::list_by_attendee(pool, attendee_id).await?;
    Ok(rows.into_iter().map(CheckInView::from).collect())
}

async fn event_of(pool: &SqlitePool, check_in_id: &str) -> AppResult<String> {
    check_in_repo::event_of_record(pool, check_in_id)
        .await?
        .ok_or_else(|| record_not_found(check_in_id))
}

fn record_not_found(check_in_id: &str) -> AppError {
    AppError::not_found(format!("check-in {} not found", check_in_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::models::CapabilitySet;
    use crate::services::event_catalog_service;
    use crate::services::test_support::{
        activity_spec, attendee_spec, create_event, event_spec, identity, pool,
    };

    struct Fixture {
        event_id: String,
        attendee_id: String,
        activity_id: String,
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let creator = identity("creator");
        let created = create_event(pool, &creator).await;
        let event_id = created.event.id;
        let attendee = event_catalog_service::create_attendee(
            pool,
            &creator,
            &event_id,
            attendee_spec("Asha", "participant"),
        )
        .await
        .unwrap();
        let activity = event_catalog_service::create_activity(
            pool,
            &creator,
            &event_id,
            activity_spec("Lunch"),
        )
        .await
        .unwrap();
        Fixture {
            event_id,
            attendee_id: attendee.attendee.attendee_id,
            activity_id: activity.activity_id,
        }
    }

    #[tokio::test]
    async fn first_scan_creates_and_second_conflicts_without_mutation() {
        let pool = pool().await;
        let f = fixture(&pool).await;

        let first = scan(&pool, &identity("s1"), &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        assert_eq!(first.outcome, ScanOutcome::Created);
        assert_eq!(first.record.status, CheckInStatus::Checked);
        assert_eq!(first.record.scanned_by, "s1");

        let err = scan(&pool, &identity("s2"), &f.attendee_id, &f.activity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = check_in_repo::load_record(&pool, &first.record.check_in_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.scanned_by, "s1");
        assert_eq!(stored.scanned_at, first.record.scanned_at);
        assert_eq!(stored.status, CheckInStatus::Checked);
    }

    #[tokio::test]
    async fn scan_after_undo_rechecks_and_restamps() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        let creator = identity("creator");

        let first = scan(&pool, &identity("s1"), &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        let undone = toggle(&pool, &creator, &first.record.check_in_id)
            .await
            .unwrap();
        assert_eq!(undone.status, CheckInStatus::Unchecked);
        assert_eq!(undone.scanned_by, "creator");

        let again = scan(&pool, &identity("s2"), &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        assert_eq!(again.outcome, ScanOutcome::Rechecked);
        assert_eq!(again.record.check_in_id, first.record.check_in_id);
        assert_eq!(again.record.status, CheckInStatus::Checked);
        assert_eq!(again.record.scanned_by, "s2");
    }

    #[tokio::test]
    async fn toggle_always_flips() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        let creator = identity("creator");

        let first = scan(&pool, &creator, &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        let mut status = first.record.status;
        for _ in 0..4 {
            let row = toggle(&pool, &creator, &first.record.check_in_id)
                .await
                .unwrap();
            assert_eq!(row.status, status.flipped());
            status = row.status;
        }

        let err = toggle(&pool, &creator, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn toggle_and_listings_require_see_scanned() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        access_control_service::grant(&pool, "staff", &f.event_id, CapabilitySet::NONE)
            .await
            .unwrap();
        let staff = identity("staff");

        // Scanning itself is open to any caller.
        let first = scan(&pool, &staff, &f.attendee_id, &f.activity_id)
            .await
            .unwrap();

        let err = toggle(&pool, &staff, &first.record.check_in_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = list_by_event(&pool, &staff, &f.event_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = list_by_attendee(&pool, &staff, &f.attendee_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        access_control_service::modify(
            &pool,
            "staff",
            &f.event_id,
            CapabilitySet {
                can_see_scanned: true,
                ..CapabilitySet::NONE
            },
        )
        .await
        .unwrap();

        let rows = list_by_activity(&pool, &staff, &f.event_id, &f.activity_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].badge_id, "participant-1");
        assert_eq!(rows[0].full_name, "Asha");
        assert_eq!(rows[0].activity_name, "Lunch");

        let id = exists_for(&pool, &staff, &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        assert_eq!(id, first.record.check_in_id);
        assert_eq!(get(&pool, &staff, &id).await.unwrap().scanned_by, "staff");
    }

    #[tokio::test]
    async fn scan_validates_both_sides() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        let creator = identity("creator");

        let err = scan(&pool, &creator, "nobody", &f.activity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = scan(&pool, &creator, &f.attendee_id, "nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let other = create_event(&pool, &creator).await;
        let foreign = event_catalog_service::create_activity(
            &pool,
            &creator,
            &other.event.id,
            activity_spec("Elsewhere"),
        )
        .await
        .unwrap();
        let err = scan(&pool, &creator, &f.attendee_id, &foreign.activity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = exists_for(&pool, &creator, &f.attendee_id, &f.activity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn records_cascade_with_attendee_and_activity() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        let creator = identity("creator");

        let first = scan(&pool, &creator, &f.attendee_id, &f.activity_id)
            .await
            .unwrap();
        event_catalog_service::delete_activity(&pool, &creator, &f.activity_id)
            .await
            .unwrap();
        assert!(check_in_repo::load_record(&pool, &first.record.check_in_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn insert_for_vanished_attendee_is_a_foreign_key_violation() {
        let pool = pool().await;
        let f = fixture(&pool).await;
        let creator = identity("creator");
        event_catalog_service::delete_attendee(&pool, &creator, &f.attendee_id)
            .await
            .unwrap();

        // Same insert scan issues once its lookups have passed.
        let err = check_in_repo::insert_record(
            &pool,
            check_in_repo::NewCheckInRecord {
                check_in_id: "late-scan",
                attendee_id: &f.attendee_id,
                activity_id: &f.activity_id,
                status: CheckInStatus::Checked,
                scanned_at: Utc::now(),
                scanned_by: "creator",
            },
        )
        .await
        .unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));

        let err = scan(&pool, &creator, &f.attendee_id, &f.activity_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_scans_leave_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("scan.db").display());
        let pool = database::connect(&url).await.unwrap();

        let creator = identity("creator");
        let created = event_catalog_service::create_event(&pool, &creator, event_spec())
            .await
            .unwrap();
        let attendee = event_catalog_service::create_attendee(
            &pool,
            &creator,
            &created.event.id,
            attendee_spec("Bikash", "participant"),
        )
        .await
        .unwrap();
        let activity = event_catalog_service::create_activity(
            &pool,
            &creator,
            &created.event.id,
            activity_spec("Dinner"),
        )
        .await
        .unwrap();

        let mut handles = Vec::new();
        for n in 0..8 {
            let pool = pool.clone();
            let attendee_id = attendee.attendee.attendee_id.clone();
            let activity_id = activity.activity_id.clone();
            handles.push(tokio::spawn(async move {
                scan(&pool, &identity(&format!("s{}", n)), &attendee_id, &activity_id).await
            }));
        }

        let mut created_count = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(r) => {
                    assert_eq!(r.outcome, ScanOutcome::Created);
                    created_count += 1;
                }
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected scan error: {other:?}"),
            }
        }
        assert_eq!(created_count, 1);
        assert_eq!(conflicts, 7);

        let rows = check_in_repo::list_by_event(&pool, &created.event.id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
