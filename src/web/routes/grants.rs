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
use crate::models::CapabilitySet;
use crate::services::access_control_service;

#[derive(Debug, Deserialize)]
pub struct GrantBody {
    pub identity_id: String,
    #[serde(flatten)]
    pub capabilities: CapabilitySet,
}

pub async fn grant_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
    Json(body): Json<GrantBody>,
) -> AppResult<impl IntoResponse> {
    let grant = access_control_service::grant_on_behalf(
        &pool,
        &actor,
        &body.identity_id,
        &event_id,
        body.capabilities,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

pub async fn list_grants_handler(
    Extension(actor): Extension<IdentityContext>,
    Path(event_id): Path<String>,
    State(pool): State<SqlitePool>,
) -> AppResult<impl IntoResponse> {
    let grants = access_control_service::list_staff(&pool, &actor, &event_id).await?;
    Ok(Json(grants))
}

pub async fn modify_grant_handler(
    Extension(actor): Extension<IdentityContext>,
    Path((event_id, identity_id)): Path<(String, String)>,
    State(pool): State<SqlitePool>,
    Json(capabilities): Json<CapabilitySet>,
) -> AppResult<impl IntoResponse> {
    let grant = access_control_service::modify_on_behalf(
        &pool,
        &actor,
        &identity_id,
        &event_id,
        capabilities,
    )
    .await?;
    Ok(Json(grant))
}
