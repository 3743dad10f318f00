use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::identity::IdentityContext;
use crate::services::event_catalog_service::{self, ActivityUpdateSpec, NewActivitySpec};

pub async fn create_activity_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(spec): Json<NewActivitySpec>,
) -> AppResult<impl IntoResponse> {
    let activity = event_catalog_service::create_activity(&pool, &identity, &event_id, spec).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn list_activities_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let activities = event_catalog_service::list_activities(&pool, &identity, &event_id).await?;
    Ok(Json(activities))
}

pub async fn update_activity_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(activity_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(spec): Json<ActivityUpdateSpec>,
) -> AppResult<impl IntoResponse> {
    let activity =
        event_catalog_service::update_activity(&pool, &identity, &activity_id, spec).await?;
    Ok(Json(activity))
}

pub async fn delete_activity_handler(
    Extension(identity): Extension<IdentityContext>,
    Path(activity_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    event_catalog_service::delete_activity(&pool, &identity, &activity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
