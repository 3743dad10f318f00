use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::identity::IdentityContext;
use crate::services::event_catalog_service::{self, NewAttendeeSpec};

#[derive(Debug, Deserialize)]
pub struct ImportBody {
    pub attendees: Vec<NewAttendeeSpec>,
}

pub async fn create_attendee_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(spec): Json<NewAttendeeSpec>,
) -> AppResult<impl IntoResponse> {
    let attendee = event_catalog_service::create_attendee(&pool, &identity, &event_id, spec).await?;
    Ok((StatusCode::CREATED, Json(attendee)))
}

pub async fn import_attendees_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(body): Json<ImportBody>,
) -> AppResult<impl IntoResponse> {
    let report =
        event_catalog_service::import_attendees(&pool, &identity, &event_id, body.attendees)
            .await?;
    Ok(Json(report))
}

pub async fn list_attendees_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let list = event_catalog_service::list_attendees(&pool, &identity, &event_id).await?;
    Ok(Json(list))
}

pub async fn get_attendee_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(attendee_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let attendee = event_catalog_service::get_attendee(&pool, &identity, &attendee_id).await?;
    Ok(Json(attendee))
}

pub async fn delete_attendee_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(attendee_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    event_catalog_service::delete_attendee(&pool, &identity, &attendee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
