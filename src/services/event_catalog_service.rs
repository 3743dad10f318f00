use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{access_grant_repo, activity_repo, attendee_repo, event_repo};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::identity::IdentityContext;
use crate::models::{ActivityRow, AttendeeRow, CapabilitySet, EventRow, EventWithCountRow};
use crate::services::access_control_service::{
    self, Capability, ADMIN_CODE_LEN, STAFF_CODE_LEN,
};
use crate::services::visibility_service::{serialize_count, Redacted, Visibility};

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const JOIN_CODE_ATTEMPTS: usize = 5;

// ---------------------------------------------------------------------------
// Requests and views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NewEventSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
}

/// Descriptive fields a creator may change; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdateSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivitySpec {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Partial activity update; the owning event is fixed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityUpdateSpec {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendeeSpec {
    pub full_name: String,
    pub organization: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    #[serde(serialize_with = "serialize_count")]
    pub participant_count: Redacted<i64>,
    pub staff_code: Option<String>,
    pub is_creator: bool,
}

/// Creation response; the only place the admin code is ever handed out.
#[derive(Debug, Clone, Serialize)]
pub struct EventCreated {
    pub event: EventView,
    pub staff_code: String,
    pub admin_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: ActivityRow,
    #[serde(serialize_with = "serialize_count")]
    pub scanned_count: Redacted<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub event: EventView,
    pub activities: Vec<ActivityView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendeeView {
    #[serde(flatten)]
    pub attendee: AttendeeRow,
    pub badge_id: String,
}

impl From<AttendeeRow> for AttendeeView {
    fn from(attendee: AttendeeRow) -> Self {
        let badge_id = attendee.badge_id();
        Self { attendee, badge_id }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendeeList {
    #[serde(serialize_with = "serialize_count")]
    pub participant_count: Redacted<i64>,
    pub attendees: Redacted<Vec<AttendeeView>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    /// 1-based position in the submitted batch.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<AttendeeView>,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug)]
pub enum JoinCodeMatch {
    Staff(EventRow),
    Admin(EventRow),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub async fn create_event(
    pool: &SqlitePool,
    identity: &IdentityContext,
    spec: NewEventSpec,
) -> AppResult<EventCreated> {
    let name = required(&spec.name, "name")?;
    check_window(spec.start_time, spec.end_time)?;

    for attempt in 1..=JOIN_CODE_ATTEMPTS {
        let event_id = Uuid::new_v4().to_string();
        let staff_code = generate_join_code(STAFF_CODE_LEN);
        let admin_code = generate_join_code(ADMIN_CODE_LEN);
        let now = Utc::now();

        let mut tx = pool.begin().await?;
        let inserted = event_repo::insert_event(
            &mut *tx,
            event_repo::NewEvent {
                event_id: &event_id,
                name,
                description: spec.description.trim(),
                start_time: spec.start_time,
                end_time: spec.end_time,
                location: spec.location.trim(),
                staff_code: &staff_code,
                admin_code: &admin_code,
                created_at: now,
            },
        )
        .await;

        let event = match inserted {
            Ok(event) => event,
            Err(e) if is_unique_violation(&e) => {
                warn!(attempt, "join code collision, regenerating");
                tx.rollback().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let grant = access_grant_repo::insert_grant(
            &mut *tx,
            access_grant_repo::NewAccessGrant {
                identity_id: &identity.id,
                event_id: &event.event_id,
                is_creator: true,
                capabilities: CapabilitySet::NONE,
                created_at: now,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            event_id = %event.event_id,
            creator = %identity.id,
            "event created"
        );

        let visibility = Visibility::from_grant(Some(grant));
        return Ok(EventCreated {
            event: event_view(&visibility, event.clone(), 0),
            staff_code: event.staff_code,
            admin_code: event.admin_code,
        });
    }

    Err(AppError::Internal(
        "could not generate unique join codes".to_string(),
    ))
}

/// Events the identity holds any grant on.
pub async fn list_events(pool: &SqlitePool, identity: &IdentityContext) -> AppResult<Vec<EventView>> {
    let rows = event_repo::list_events_for_identity(pool, &identity.id).await?;
    let mut grants: HashMap<String, _> =
        access_grant_repo::list_grants_for_identity(pool, &identity.id)
            .await?
            .into_iter()
            .map(|g| (g.event_id.clone(), g))
            .collect();

    Ok(rows
        .into_iter()
        .map(|EventWithCountRow { event, participant_count }| {
            let visibility = Visibility::from_grant(grants.remove(&event.event_id));
            event_view(&visibility, event, participant_count)
        })
        .collect())
}

pub async fn get_event(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<EventDetail> {
    let Some(row) = event_repo::load_event_with_count(pool, event_id).await? else {
        return Err(event_not_found(event_id));
    };
    let grant = access_control_service::require_grant(pool, identity, event_id).await?;
    let visibility = Visibility::from_grant(Some(grant));
    let activities = activity_views(pool, &visibility, event_id).await?;

    Ok(EventDetail {
        event: event_view(&visibility, row.event, row.participant_count),
        activities,
    })
}

pub async fn update_event(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    spec: EventUpdateSpec,
) -> AppResult<EventView> {
    let current = load_event(pool, event_id).await?;
    access_control_service::require_creator(pool, identity, event_id).await?;

    let name = match spec.name.as_deref() {
        Some(n) => required(n, "name")?.to_string(),
        None => current.name,
    };
    let description = spec
        .description
        .map(|d| d.trim().to_string())
        .unwrap_or(current.description);
    let location = spec
        .location
        .map(|l| l.trim().to_string())
        .unwrap_or(current.location);
    let start_time = spec.start_time.unwrap_or(current.start_time);
    let end_time = spec.end_time.unwrap_or(current.end_time);
    check_window(start_time, end_time)?;

    let updated = event_repo::update_event_details(
        pool,
        event_id,
        event_repo::EventDetails {
            name: &name,
            description: &description,
            start_time,
            end_time,
            location: &location,
        },
    )
    .await?
    .ok_or_else(|| event_not_found(event_id))?;

    info!(event_id = %event_id, "event details updated");

    let detail = get_event(pool, identity, &updated.event_id).await?;
    Ok(detail.event)
}

/// Creator-only; activities, attendees, grants and check-ins go with it.
pub async fn delete_event(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<()> {
    load_event(pool, event_id).await?;
    access_control_service::require_creator(pool, identity, event_id).await?;

    if event_repo::delete_event(pool, event_id).await? == 0 {
        return Err(event_not_found(event_id));
    }
    info!(event_id = %event_id, actor = %identity.id, "event deleted");
    Ok(())
}

/// Classifies a join code by length and looks it up.
pub async fn resolve_event_by_join_code(
    pool: &SqlitePool,
    code: &str,
) -> AppResult<Option<JoinCodeMatch>> {
    let code = code.trim().to_ascii_uppercase();
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::invalid("join code must be alphanumeric"));
    }

    match code.len() {
        STAFF_CODE_LEN => Ok(event_repo::find_by_staff_code(pool, &code)
            .await?
            .map(JoinCodeMatch::Staff)),
        ADMIN_CODE_LEN => Ok(event_repo::find_by_admin_code(pool, &code)
            .await?
            .map(JoinCodeMatch::Admin)),
        _ => Err(AppError::invalid(format!(
            "join code must be {} or {} characters",
            STAFF_CODE_LEN, ADMIN_CODE_LEN
        ))),
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

pub async fn create_activity(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    spec: NewActivitySpec,
) -> AppResult<ActivityRow> {
    load_event(pool, event_id).await?;
    access_control_service::require_capability(pool, identity, event_id, Capability::CreateActivity)
        .await?;

    let name = required(&spec.name, "name")?;
    check_window(spec.start_time, spec.end_time)?;

    let activity_id = Uuid::new_v4().to_string();
    let row = activity_repo::insert_activity(
        pool,
        activity_repo::NewActivity {
            activity_id: &activity_id,
            event_id,
            name,
            kind: spec.kind.trim(),
            start_time: spec.start_time,
            end_time: spec.end_time,
        },
    )
    .await?;

    info!(
        event_id = %event_id,
        activity_id = %row.activity_id,
        actor = %identity.id,
        "activity created"
    );
    Ok(row)
}

pub async fn list_activities(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<Vec<ActivityView>> {
    load_event(pool, event_id).await?;
    let grant = access_control_service::require_grant(pool, identity, event_id).await?;
    activity_views(pool, &Visibility::from_grant(Some(grant)), event_id).await
}

pub async fn update_activity(
    pool: &SqlitePool,
    identity: &IdentityContext,
    activity_id: &str,
    spec: ActivityUpdateSpec,
) -> AppResult<ActivityRow> {
    let current = load_activity(pool, activity_id).await?;
    access_control_service::require_capability(
        pool,
        identity,
        &current.event_id,
        Capability::CreateActivity,
    )
    .await?;

    let name = match spec.name.as_deref() {
        Some(n) => required(n, "name")?.to_string(),
        None => current.name,
    };
    let kind = spec
        .kind
        .map(|k| k.trim().to_string())
        .unwrap_or(current.kind);
    let start_time = spec.start_time.unwrap_or(current.start_time);
    let end_time = spec.end_time.unwrap_or(current.end_time);
    check_window(start_time, end_time)?;

    let row = activity_repo::update_activity(
        pool,
        activity_id,
        activity_repo::ActivityDetails {
            name: &name,
            kind: &kind,
            start_time,
            end_time,
        },
    )
    .await?
    .ok_or_else(|| activity_not_found(activity_id))?;

    info!(activity_id = %activity_id, actor = %identity.id, "activity updated");
    Ok(row)
}

pub async fn delete_activity(
    pool: &SqlitePool,
    identity: &IdentityContext,
    activity_id: &str,
) -> AppResult<()> {
    let activity = load_activity(pool, activity_id).await?;
    access_control_service::require_capability(
        pool,
        identity,
        &activity.event_id,
        Capability::CreateActivity,
    )
    .await?;

    activity_repo::delete_activity(pool, activity_id).await?;
    info!(activity_id = %activity_id, actor = %identity.id, "activity deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendees
// ---------------------------------------------------------------------------

pub async fn create_attendee(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    spec: NewAttendeeSpec,
) -> AppResult<AttendeeView> {
    load_event(pool, event_id).await?;
    access_control_service::require_capability(pool, identity, event_id, Capability::CreateAttendee)
        .await?;
    insert_attendee(pool, event_id, &spec).await.map(AttendeeView::from)
}

/// Bulk create. Each row is independent: a bad row lands in `failures` and the
/// rest still go in.
pub async fn import_attendees(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    rows: Vec<NewAttendeeSpec>,
) -> AppResult<ImportReport> {
    load_event(pool, event_id).await?;
    access_control_service::require_capability(pool, identity, event_id, Capability::CreateAttendee)
        .await?;

    let mut report = ImportReport::default();
    for (idx, spec) in rows.iter().enumerate() {
        match insert_attendee(pool, event_id, spec).await {
            Ok(row) => report.created.push(row.into()),
            Err(AppError::Internal(detail)) => {
                // Storage failures abort the batch; rows already in stay in.
                warn!(event_id = %event_id, row = idx + 1, "attendee import aborted");
                return Err(AppError::Internal(detail));
            }
            Err(e) => report.failures.push(ImportFailure {
                row: idx + 1,
                reason: e.to_string(),
            }),
        }
    }

    info!(
        event_id = %event_id,
        created = report.created.len(),
        failed = report.failures.len(),
        "attendee import done"
    );
    Ok(report)
}

pub async fn list_attendees(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<AttendeeList> {
    load_event(pool, event_id).await?;
    let grant = access_control_service::require_grant(pool, identity, event_id).await?;
    let visibility = Visibility::from_grant(Some(grant));

    let rows = attendee_repo::list_attendees(pool, event_id).await?;
    let count = rows.len() as i64;
    let views: Vec<AttendeeView> = rows.into_iter().map(AttendeeView::from).collect();

    Ok(AttendeeList {
        participant_count: visibility.participant_count(count),
        attendees: visibility.attendees(views),
    })
}

/// Single roster entry; needs the same capability as the full roster.
pub async fn get_attendee(
    pool: &SqlitePool,
    identity: &IdentityContext,
    attendee_id: &str,
) -> AppResult<AttendeeView> {
    let Some(attendee) = attendee_repo::load_attendee(pool, attendee_id).await? else {
        return Err(AppError::not_found(format!("attendee {} not found", attendee_id)));
    };
    access_control_service::require_capability(
        pool,
        identity,
        &attendee.event_id,
        Capability::SeeAttendee,
    )
    .await?;
    Ok(attendee.into())
}

pub async fn delete_attendee(
    pool: &SqlitePool,
    identity: &IdentityContext,
    attendee_id: &str,
) -> AppResult<()> {
    let Some(attendee) = attendee_repo::load_attendee(pool, attendee_id).await? else {
        return Err(AppError::not_found(format!("attendee {} not found", attendee_id)));
    };
    access_control_service::require_capability(
        pool,
        identity,
        &attendee.event_id,
        Capability::CreateAttendee,
    )
    .await?;

    attendee_repo::delete_attendee(pool, attendee_id).await?;
    info!(attendee_id = %attendee_id, actor = %identity.id, "attendee deleted");
    Ok(())
}

async fn insert_attendee(
    pool: &SqlitePool,
    event_id: &str,
    spec: &NewAttendeeSpec,
) -> AppResult<AttendeeRow> {
    let full_name = required(&spec.full_name, "full_name")?;
    let organization = required(&spec.organization, "organization")?;
    let role = required(&spec.role, "role")?;

    // Sequence bump and insert commit together, or neither does.
    let mut tx = pool.begin().await?;
    let sequence = attendee_repo::next_sequence(&mut *tx, event_id, role).await?;
    let attendee_id = Uuid::new_v4().to_string();
    let inserted = attendee_repo::insert_attendee(
        &mut *tx,
        attendee_repo::NewAttendee {
            attendee_id: &attendee_id,
            event_id,
            full_name,
            organization,
            title: spec.title.trim(),
            image_url: spec.image_url.trim(),
            role,
            sequence,
            created_at: Utc::now(),
        },
    )
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::AlreadyExists(format!(
                "badge {}-{} already taken in event {}",
                role, sequence, event_id
            )));
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) async fn load_event(pool: &SqlitePool, event_id: &str) -> AppResult<EventRow> {
    event_repo::load_event(pool, event_id)
        .await?
        .ok_or_else(|| event_not_found(event_id))
}

async fn activity_views(
    pool: &SqlitePool,
    visibility: &Visibility,
    event_id: &str,
) -> AppResult<Vec<ActivityView>> {
    let rows = activity_repo::list_activities_with_counts(pool, event_id).await?;
    Ok(rows
        .into_iter()
        .map(|row| ActivityView {
            scanned_count: visibility.scanned_count(row.scanned_count),
            activity: row.activity,
        })
        .collect())
}

fn event_view(visibility: &Visibility, event: EventRow, participant_count: i64) -> EventView {
    EventView {
        staff_code: visibility.staff_code(&event.staff_code),
        participant_count: visibility.participant_count(participant_count),
        is_creator: visibility.is_creator(),
        id: event.event_id,
        name: event.name,
        description: event.description,
        start_time: event.start_time,
        end_time: event.end_time,
        location: event.location,
    }
}

async fn load_activity(pool: &SqlitePool, activity_id: &str) -> AppResult<ActivityRow> {
    activity_repo::load_activity(pool, activity_id)
        .await?
        .ok_or_else(|| activity_not_found(activity_id))
}

fn activity_not_found(activity_id: &str) -> AppError {
    AppError::not_found(format!("activity {} not found", activity_id))
}

fn event_not_found(event_id: &str) -> AppError {
    AppError::not_found(format!("event {} not found", event_id))
}

fn required<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::invalid(format!("{} must not be empty", field)));
    }
    Ok(v)
}

fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end < start {
        return Err(AppError::invalid("end_time must not be before start_time"));
    }
    Ok(())
}

fn generate_join_code(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}
