pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::identity::IdentityVerifier;
use middleware::{auth, rate_limit::RateLimiter};
use routes::{activities, attendees, check_ins, events, grants, health};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<dyn IdentityVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<RateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/events",
            post(events::create_event_handler).get(events::list_events_handler),
        )
        .route(
            "/events/:event_id",
            get(events::get_event_handler)
                .patch(events::update_event_handler)
                .delete(events::delete_event_handler),
        )
        .route("/join/:code", post(events::join_handler))
        .route(
            "/events/:event_id/activities",
            post(activities::create_activity_handler).get(activities::list_activities_handler),
        )
        .route(
            "/activities/:activity_id",
            patch(activities::update_activity_handler).delete(activities::delete_activity_handler),
        )
        .route(
            "/events/:event_id/attendees",
            post(attendees::create_attendee_handler).get(attendees::list_attendees_handler),
        )
        .route(
            "/events/:event_id/attendees/import",
            post(attendees::import_attendees_handler),
        )
        .route(
            "/attendees/:attendee_id",
            get(attendees::get_attendee_handler).delete(attendees::delete_attendee_handler),
        )
        .route(
            "/events/:event_id/grants",
            post(grants::grant_handler).get(grants::list_grants_handler),
        )
        .route(
            "/events/:event_id/grants/:identity_id",
            put(grants::modify_grant_handler),
        )
        .route("/check-ins", post(check_ins::scan_handler))
        .route("/check-ins/lookup", get(check_ins::lookup_handler))
        .route("/check-ins/:check_in_id", get(check_ins::get_handler))
        .route(
            "/check-ins/:check_in_id/toggle",
            post(check_ins::toggle_handler),
        )
        .route(
            "/events/:event_id/check-ins",
            get(check_ins::list_by_event_handler),
        )
        .route(
            "/events/:event_id/check-ins/export",
            get(check_ins::export_handler),
        )
        .route(
            "/events/:event_id/activities/:activity_id/check-ins",
            get(check_ins::list_by_activity_handler),
        )
        .route(
            "/attendees/:attendee_id/check-ins",
            get(check_ins::list_by_attendee_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::limit_by_ip,
        ));

    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api", api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
