use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::config::{utc_offset, AppConfig};
use crate::error::{AppError, AppResult};
use crate::identity::IdentityContext;
use crate::services::check_in_service::{self, ScanOutcome};
use crate::services::reporting_service;

#[derive(Debug, Deserialize)]
pub struct ScanBody {
    pub attendee_id: String,
    pub activity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub attendee_id: String,
    pub activity_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportQuery {
    pub utc_offset_minutes: Option<i32>,
}

pub async fn scan_handler(
    Extension(actor): Extension<IdentityContext>,
    State(pool): State<SqlitePool>,
    Json(body): Json<ScanBody>,
) -> AppResult<impl IntoResponse> {
    let result =
        check_in_service::scan(&pool, &actor, &body.attendee_id, &body.activity_id).await?;
    let status = match result.outcome {
        ScanOutcome::Created => StatusCode::CREATED,
        ScanOutcome::Rechecked => StatusCode::OK,
    };
    Ok((status, Json(result)))
}

pub async fn toggle_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(check_in_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let record = check_in_service::toggle(&pool, &actor, &check_in_id).await?;
    Ok(Json(record))
}

pub async fn get_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(check_in_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let record = check_in_service::get(&pool, &actor, &check_in_id).await?;
    Ok(Json(record))
}

pub async fn lookup_handler(
    Extension(actor): Extension<IdentityContext>,
    Query(query): Query<LookupQuery>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let id =
        check_in_service::exists_for(&pool, &actor, &query.attendee_id, &query.activity_id)
            .await?;
    Ok(Json(json!({ "check_in_id": id })))
}

pub async fn list_by_event_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let rows = check_in_service::list_by_event(&pool, &actor, &event_id).await?;
    Ok(Json(rows))
}

pub async fn list_by_activity_handler(
    Extension(actor): Extension<IdentityContext>,
    Path((event_id, activity_id)): Path<(String, String)>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let rows = check_in_service::list_by_activity(&pool, &actor, &event_id, &activity_id).await?;
    Ok(Json(rows))
}

pub async fn list_by_attendee_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(attendee_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let rows = check_in_service::list_by_attendee(&pool, &actor, &attendee_id).await?;
    Ok(Json(rows))
}

pub async fn export_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    Query(query): Query<ExportQuery>,
    State(pool): State<SqlitePool>,
    State(config): State<Arc<AppConfig>>,
) -> AppResult<impl IntoResponse> {
    let offset = match query.utc_offset_minutes {
        Some(minutes) => utc_offset(minutes)
            .ok_or_else(|| AppError::invalid("utc_offset_minutes out of range"))?,
        None => config.report_offset(),
    };
    let export = reporting_service::export_check_ins(&pool, &actor, &event_id, offset).await?;
    Ok(Json(export))
}
