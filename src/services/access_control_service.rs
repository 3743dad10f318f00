use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{access_grant_repo, event_repo};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::identity::IdentityContext;
use crate::models::{AccessGrantRow, CapabilitySet};
use crate::services::event_catalog_service::{self, JoinCodeMatch};

pub const STAFF_CODE_LEN: usize = 6;
pub const ADMIN_CODE_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SeeScanned,
    CreateActivity,
    CreateAttendee,
    SeeAttendee,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::SeeScanned,
        Capability::CreateActivity,
        Capability::CreateAttendee,
        Capability::SeeAttendee,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SeeScanned => "can_see_scanned",
            Self::CreateActivity => "can_create_activity",
            Self::CreateAttendee => "can_create_attendee",
            Self::SeeAttendee => "can_see_attendee",
        }
    }

    fn stored_bit(self, grant: &AccessGrantRow) -> bool {
        match self {
            Self::SeeScanned => grant.can_see_scanned,
            Self::CreateActivity => grant.can_create_activity,
            Self::CreateAttendee => grant.can_create_attendee,
            Self::SeeAttendee => grant.can_see_attendee,
        }
    }
}

/// Evaluation rule shared by every check: creator implies all bits, and a
/// missing grant is the same as a grant with every bit cleared.
pub fn grant_allows(grant: Option<&AccessGrantRow>, capability: Capability) -> bool {
    match grant {
        Some(g) => g.is_creator || capability.stored_bit(g),
        None => false,
    }
}

pub async fn grant(
    pool: &SqlitePool,
    identity_id: &str,
    event_id: &str,
    capabilities: CapabilitySet,
) -> AppResult<AccessGrantRow> {
    insert_grant_row(pool, identity_id, event_id, false, capabilities).await
}

pub async fn modify(
    pool: &SqlitePool,
    identity_id: &str,
    event_id: &str,
    capabilities: CapabilitySet,
) -> AppResult<AccessGrantRow> {
    let updated =
        access_grant_repo::update_capabilities(pool, identity_id, event_id, capabilities).await?;
    let Some(row) = updated else {
        return Err(AppError::not_found(format!(
            "no grant for identity {} on event {}",
            identity_id, event_id
        )));
    };
    info!(
        identity_id = %identity_id,
        event_id = %event_id,
        ?capabilities,
        "capabilities modified"
    );
    Ok(row)
}

pub async fn load_grant(
    pool: &SqlitePool,
    identity_id: &str,
    event_id: &str,
) -> AppResult<Option<AccessGrantRow>> {
    Ok(access_grant_repo::load_grant(pool, identity_id, event_id).await?)
}

pub async fn evaluate(
    pool: &SqlitePool,
    identity_id: &str,
    event_id: &str,
    capability: Capability,
) -> AppResult<bool> {
    let grant = access_grant_repo::load_grant(pool, identity_id, event_id).await?;
    Ok(grant_allows(grant.as_ref(), capability))
}

pub async fn is_creator(pool: &SqlitePool, identity_id: &str, event_id: &str) -> AppResult<bool> {
    let grant = access_grant_repo::load_grant(pool, identity_id, event_id).await?;
    Ok(grant.map(|g| g.is_creator).unwrap_or(false))
}

/// Guard run before every gated catalog or ledger operation.
pub async fn require_capability(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
    capability: Capability,
) -> AppResult<()> {
    if evaluate(pool, &identity.id, event_id, capability).await? {
        return Ok(());
    }
    warn!(
        identity_id = %identity.id,
        event_id = %event_id,
        capability = capability.as_str(),
        "capability check failed"
    );
    Err(AppError::forbidden(format!(
        "missing capability {} on event {}",
        capability.as_str(),
        event_id
    )))
}

pub async fn require_creator(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<()> {
    if is_creator(pool, &identity.id, event_id).await? {
        return Ok(());
    }
    warn!(
        identity_id = %identity.id,
        event_id = %event_id,
        "creator check failed"
    );
    Err(AppError::forbidden(format!(
        "only the creator of event {} may do this",
        event_id
    )))
}

/// Any grant at all, even with every bit cleared. Gates reads of event
/// details; what the grant then shows is up to the visibility service.
pub async fn require_grant(
    pool: &SqlitePool,
    identity: &IdentityContext,
    event_id: &str,
) -> AppResult<AccessGrantRow> {
    if let Some(grant) = access_grant_repo::load_grant(pool, &identity.id, event_id).await? {
        return Ok(grant);
    }
    warn!(
        identity_id = %identity.id,
        event_id = %event_id,
        "no grant on event"
    );
    Err(AppError::forbidden(format!(
        "no access to event {}",
        event_id
    )))
}

/// Creator-only: grants capabilities to another identity.
pub async fn grant_on_behalf(
    pool: &SqlitePool,
    actor: &IdentityContext,
    target_identity_id: &str,
    event_id: &str,
    capabilities: CapabilitySet,
) -> AppResult<AccessGrantRow> {
    require_creator(pool, actor, event_id).await?;
    grant(pool, target_identity_id, event_id, capabilities).await
}

/// Creator-only: overwrites another identity's capability bits.
pub async fn modify_on_behalf(
    pool: &SqlitePool,
    actor: &IdentityContext,
    target_identity_id: &str,
    event_id: &str,
    capabilities: CapabilitySet,
) -> AppResult<AccessGrantRow> {
    require_creator(pool, actor, event_id).await?;
    modify(pool, target_identity_id, event_id, capabilities).await
}

/// Creator-only: every grant on the event, creator first.
pub async fn list_staff(
    pool: &SqlitePool,
    actor: &IdentityContext,
    event_id: &str,
) -> AppResult<Vec<AccessGrantRow>> {
    require_creator(pool, actor, event_id).await?;
    Ok(access_grant_repo::list_grants_for_event(pool, event_id).await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub event_id: String,
    pub event_name: String,
    pub grant: AccessGrantRow,
}

/// Joins an event with a shared code: the staff code yields a grant with no
/// capabilities, the admin code a creator grant.
pub async fn self_enroll(
    pool: &SqlitePool,
    identity: &IdentityContext,
    join_code: &str,
) -> AppResult<Enrollment> {
    let Some(matched) = event_catalog_service::resolve_event_by_join_code(pool, join_code).await?
    else {
        return Err(AppError::not_found("no event matches this join code"));
    };

    let (event, is_creator) = match matched {
        JoinCodeMatch::Staff(event) => (event, false),
        JoinCodeMatch::Admin(event) => (event, true),
    };

    let grant = insert_grant_row(
        pool,
        &identity.id,
        &event.event_id,
        is_creator,
        CapabilitySet::NONE,
    )
    .await?;

    info!(
        identity_id = %identity.id,
        event_id = %event.event_id,
        is_creator,
        "identity self-enrolled"
    );

    Ok(Enrollment {
        event_id: event.event_id,
        event_name: event.name,
        grant,
    })
}

async fn insert_grant_row(
    pool: &SqlitePool,
    identity_id: &str,
    event_id: &str,
    is_creator: bool,
    capabilities: CapabilitySet,
) -> AppResult<AccessGrantRow> {
    if identity_id.trim().is_empty() {
        return Err(AppError::invalid("identity id must not be empty"));
    }
    if event_repo::load_event(pool, event_id).await?.is_none() {
        return Err(AppError::not_found(format!("event {} not found", event_id)));
    }

    let inserted = access_grant_repo::insert_grant(
        pool,
        access_grant_repo::NewAccessGrant {
            identity_id,
            event_id,
            is_creator,
            capabilities,
            created_at: Utc::now(),
        },
    )
    .await;

    match inserted {
        Ok(row) => {
            info!(
                identity_id = %identity_id,
                event_id = %event_id,
                is_creator,
                "grant created"
            );
            Ok(row)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyExists(format!(
            "identity {} already has a grant on event {}",
            identity_id, event_id
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{create_event, identity, pool};

    #[tokio::test]
    async fn creator_evaluates_every_capability_regardless_of_bits() {
        let pool = pool().await;
        let creator = identity("creator");
        let created = create_event(&pool, &creator).await;

        let grant = load_grant(&pool, "creator", &created.event.id).await.unwrap().unwrap();
        assert!(grant.is_creator);
        assert!(!grant.can_see_scanned);

        for capability in Capability::ALL {
            assert!(evaluate(&pool, "creator", &created.event.id, capability)
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn missing_grant_evaluates_false_without_error() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;

        for capability in Capability::ALL {
            assert!(!evaluate(&pool, "stranger", &created.event.id, capability)
                .await
                .unwrap());
        }
        assert!(!is_creator(&pool, "stranger", &created.event.id).await.unwrap());
        assert!(!evaluate(&pool, "stranger", "no-such-event", Capability::SeeScanned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn grant_and_modify_follow_existence_rules() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;
        let event_id = created.event.id.as_str();

        let err = modify(&pool, "staff", event_id, CapabilitySet::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let caps = CapabilitySet {
            can_see_scanned: true,
            ..CapabilitySet::NONE
        };
        let row = grant(&pool, "staff", event_id, caps).await.unwrap();
        assert!(row.can_see_scanned);
        assert!(!row.is_creator);

        let err = grant(&pool, "staff", event_id, caps).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        let row = modify(
            &pool,
            "staff",
            event_id,
            CapabilitySet {
                can_create_activity: true,
                ..CapabilitySet::NONE
            },
        )
        .await
        .unwrap();
        assert!(!row.can_see_scanned);
        assert!(row.can_create_activity);
        assert!(evaluate(&pool, "staff", event_id, Capability::CreateActivity)
            .await
            .unwrap());
        assert!(!evaluate(&pool, "staff", event_id, Capability::SeeScanned)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn modify_never_touches_creator_flag() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;

        let row = modify(&pool, "creator", &created.event.id, CapabilitySet::NONE)
            .await
            .unwrap();
        assert!(row.is_creator);
        assert!(evaluate(&pool, "creator", &created.event.id, Capability::SeeAttendee)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn require_grant_accepts_empty_grants_only() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;
        let event_id = created.event.id.as_str();

        let err = require_grant(&pool, &identity("stranger"), event_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        grant(&pool, "bits-off", event_id, CapabilitySet::NONE)
            .await
            .unwrap();
        let row = require_grant(&pool, &identity("bits-off"), event_id)
            .await
            .unwrap();
        assert!(!row.is_creator);
        assert!(require_grant(&pool, &identity("creator"), event_id)
            .await
            .unwrap()
            .is_creator);
    }

    #[tokio::test]
    async fn grant_on_unknown_event_is_not_found() {
        let pool = pool().await;
        let err = grant(&pool, "staff", "missing", CapabilitySet::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_creator_may_grant_or_modify_others() {
        let pool = pool().await;
        let creator = identity("creator");
        let created = create_event(&pool, &creator).await;
        let event_id = created.event.id.as_str();

        grant_on_behalf(&pool, &creator, "staff", event_id, CapabilitySet::NONE)
            .await
            .unwrap();

        let staff = identity("staff");
        let err = grant_on_behalf(&pool, &staff, "other", event_id, CapabilitySet::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = modify_on_behalf(&pool, &staff, "staff", event_id, CapabilitySet::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = list_staff(&pool, &staff, event_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let staff_list = list_staff(&pool, &creator, event_id).await.unwrap();
        assert_eq!(staff_list.len(), 2);
        assert!(staff_list[0].is_creator);
        assert_eq!(staff_list[1].identity_id, "staff");
    }

    #[tokio::test]
    async fn staff_code_enrolls_without_capabilities() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;
        let staff = identity("staff");

        let enrollment = self_enroll(&pool, &staff, &created.staff_code).await.unwrap();
        assert_eq!(enrollment.event_id, created.event.id);
        assert!(!enrollment.grant.is_creator);
        for capability in Capability::ALL {
            assert!(!grant_allows(Some(&enrollment.grant), capability));
        }

        let err = self_enroll(&pool, &staff, &created.staff_code).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn admin_code_enrolls_as_creator() {
        let pool = pool().await;
        let created = create_event(&pool, &identity("creator")).await;
        let admin = identity("co-organizer");

        let enrollment = self_enroll(&pool, &admin, &created.admin_code).await.unwrap();
        assert!(enrollment.grant.is_creator);
        assert!(is_creator(&pool, "co-organizer", &created.event.id).await.unwrap());
    }

    #[tokio::test]
    async fn join_code_errors() {
        let pool = pool().await;
        create_event(&pool, &identity("creator")).await;
        let someone = identity("someone");

        let err = self_enroll(&pool, &someone, "ABCDE").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = self_enroll(&pool, &someone, "ZZZZZZZZ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // Well-formed but unknown.
        let err = self_enroll(&pool, &someone, "QQQQQQ").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = self_enroll(&pool, &someone, "QQQQQQQ").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
