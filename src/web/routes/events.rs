use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::identity::IdentityContext;
use crate::services::access_control_service;
use crate::services::event_catalog_service::{self, EventUpdateSpec, NewEventSpec};

pub async fn create_event_handler(
    Extension(identity): Extension<IdentityContext>,
    State(pool): State<SqlitePool>,
    Json(spec): Json<NewEventSpec>,
) -> AppResult<impl IntoResponse> {
    let created = event_catalog_service::create_event(&pool, &identity, spec).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_events_handler(
    Extension(identity): Extension<IdentityContext>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let events = event_catalog_service::list_events(&pool, &identity).await?;
    Ok(Json(events))
}

pub async fn get_event_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let detail = event_catalog_service::get_event(&pool, &identity, &event_id).await?;
    Ok(Json(detail))
}

pub async fn update_event_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(update): Json<EventUpdateSpec>,
) -> AppResult<impl IntoResponse> {
    let event = event_catalog_service::update_event(&pool, &identity, &event_id, update).await?;
    Ok(Json(event))
}

pub async fn delete_event_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    event_catalog_service::delete_event(&pool, &identity, &event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Self-enrollment with a staff or admin join code.
pub async fn join_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(code): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let enrollment = access_control_service::self_enroll(&pool, &identity, &code).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}
