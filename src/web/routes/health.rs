use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::warn;

pub async fn health_handler(
    State(pool): State<SqlitePool>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            warn!("health check failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            ))
        }
    }
}
