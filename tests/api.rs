use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use event_checkin::config::AppConfig;
use event_checkin::database;
use event_checkin::identity::JwtPayloadVerifier;
use event_checkin::web::{self, middleware::rate_limit::RateLimiter, AppState};

async fn app() -> Router {
    let config = AppConfig::default();
    let pool = database::connect_in_memory().await.unwrap();
    web::router(AppState {
        pool,
        verifier: Arc::new(JwtPayloadVerifier),
        rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
        config: Arc::new(config),
    })
}

fn token(sub: &str) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(json!({ "sub": sub }).to_string());
    format!("{}.{}.sig", header, payload)
}

async fn call(app: &Router, method: Method, uri: &str, who: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(who) = who {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(who)));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn event_body() -> Value {
    json!({
        "name": "Tech Summit",
        "start_time": "2025-05-10T03:15:00Z",
        "end_time": "2025-05-12T03:15:00Z",
        "location": "Kathmandu"
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn api_requires_a_token() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let request = Request::builder()
        .uri("/api/events")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_enrolls_scans_and_is_denied_activity_creation() {
    let app = app().await;

    let (status, created) =
        call(&app, Method::POST, "/api/events", Some("creator"), Some(event_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let event_id = created["event"]["id"].as_str().unwrap().to_string();
    let staff_code = created["staff_code"].as_str().unwrap().to_string();
    assert_eq!(created["admin_code"].as_str().unwrap().len(), 7);

    let (status, activity) = call(
        &app,
        Method::POST,
        &format!("/api/events/{}/activities", event_id),
        Some("creator"),
        Some(json!({
            "name": "Lunch",
            "kind": "meal",
            "start_time": "2025-05-10T06:00:00Z",
            "end_time": "2025-05-10T07:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let activity_id = activity["activity_id"].as_str().unwrap().to_string();

    let (status, attendee) = call(
        &app,
        Method::POST,
        &format!("/api/events/{}/attendees", event_id),
        Some("creator"),
        Some(json!({
            "full_name": "Asha Rai",
            "organization": "Acme",
            "role": "participant"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attendee["badge_id"], "participant-1");
    let attendee_id = attendee["attendee_id"].as_str().unwrap().to_string();

    // Staff joins with the 6-character code and gets no capabilities.
    let (status, enrollment) = call(
        &app,
        Method::POST,
        &format!("/api/join/{}", staff_code),
        Some("staff"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(enrollment["grant"]["is_creator"], false);
    assert_eq!(enrollment["grant"]["can_see_scanned"], false);
    assert_eq!(enrollment["grant"]["can_create_activity"], false);

    // Redacted shapes for the new staff member.
    let (status, roster) = call(
        &app,
        Method::GET,
        &format!("/api/events/{}/attendees", event_id),
        Some("staff"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["participant_count"], -1);
    assert!(roster["attendees"].is_null());

    let (_, detail) = call(
        &app,
        Method::GET,
        &format!("/api/events/{}", event_id),
        Some("staff"),
        None,
    )
    .await;
    assert_eq!(detail["event"]["participant_count"], -1);
    assert!(detail["event"]["staff_code"].is_null());
    assert!(detail["event"].get("admin_code").is_none());
    assert_eq!(detail["activities"][0]["scanned_count"], -1);

    // Scanning is open to any authenticated caller.
    let scan = json!({ "attendee_id": attendee_id, "activity_id": activity_id });
    let (status, scanned) =
        call(&app, Method::POST, "/api/check-ins", Some("staff"), Some(scan.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(scanned["record"]["status"], "checked");
    assert_eq!(scanned["record"]["scanned_by"], "staff");

    let (status, body) =
        call(&app, Method::POST, "/api/check-ins", Some("staff"), Some(scan)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/events/{}/activities", event_id),
        Some("staff"),
        Some(json!({
            "name": "Dinner",
            "start_time": "2025-05-10T12:00:00Z",
            "end_time": "2025-05-10T13:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Creator sees the counts.
    let (_, detail) = call(
        &app,
        Method::GET,
        &format!("/api/events/{}", event_id),
        Some("creator"),
        None,
    )
    .await;
    assert_eq!(detail["event"]["participant_count"], 1);
    assert_eq!(detail["event"]["staff_code"], staff_code.as_str());
    assert_eq!(detail["activities"][0]["scanned_count"], 1);
}

#[tokio::test]
async fn creator_manages_grants_and_exports() {
    let app = app().await;
    let (_, created) =
        call(&app, Method::POST, "/api/events", Some("creator"), Some(event_body())).await;
    let event_id = created["event"]["id"].as_str().unwrap().to_string();
    let grants_uri = format!("/api/events/{}/grants", event_id);

    let (status, grant) = call(
        &app,
        Method::POST,
        &grants_uri,
        Some("creator"),
        Some(json!({ "identity_id": "helper", "can_see_scanned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(grant["can_see_scanned"], true);
    assert_eq!(grant["can_see_attendee"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        &grants_uri,
        Some("creator"),
        Some(json!({ "identity_id": "helper" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::GET, &grants_uri, Some("helper"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = call(
        &app,
        Method::PUT,
        &format!("{}/helper", grants_uri),
        Some("creator"),
        Some(json!({ "can_see_attendee": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["can_see_scanned"], false);
    assert_eq!(updated["can_see_attendee"], true);

    let (status, grants) = call(&app, Method::GET, &grants_uri, Some("creator"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grants.as_array().unwrap().len(), 2);

    let export_uri = format!("/api/events/{}/check-ins/export", event_id);
    let (status, export) = call(&app, Method::GET, &export_uri, Some("creator"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["utc_offset_minutes"], 345);
    assert_eq!(export["rows"].as_array().unwrap().len(), 0);

    let (status, export) = call(
        &app,
        Method::GET,
        &format!("{}?utc_offset_minutes=-60", export_uri),
        Some("creator"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["utc_offset_minutes"], -60);

    let (status, _) = call(&app, Method::GET, &export_uri, Some("helper"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn join_code_errors_map_to_status_codes() {
    let app = app().await;
    let (status, _) = call(&app, Method::POST, "/api/join/ABC", Some("someone"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, "/api/join/QQQQQQ", Some("someone"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strangers_are_denied_and_activities_can_be_rescheduled() {
    let app = app().await;
    let (_, created) =
        call(&app, Method::POST, "/api/events", Some("creator"), Some(event_body())).await;
    let event_id = created["event"]["id"].as_str().unwrap().to_string();

    for uri in [
        format!("/api/events/{}", event_id),
        format!("/api/events/{}/activities", event_id),
        format!("/api/events/{}/attendees", event_id),
    ] {
        let (status, body) = call(&app, Method::GET, &uri, Some("stranger"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "forbidden");
    }

    let (_, activity) = call(
        &app,
        Method::POST,
        &format!("/api/events/{}/activities", event_id),
        Some("creator"),
        Some(json!({
            "name": "Lunch",
            "kind": "meal",
            "start_time": "2025-05-10T06:00:00Z",
            "end_time": "2025-05-10T07:00:00Z"
        })),
    )
    .await;
    let activity_uri = format!("/api/activities/{}", activity["activity_id"].as_str().unwrap());

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &activity_uri,
        Some("creator"),
        Some(json!({ "name": "Late lunch", "end_time": "2025-05-10T08:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Late lunch");
    assert_eq!(updated["kind"], "meal");

    let (status, _) = call(
        &app,
        Method::PATCH,
        &activity_uri,
        Some("creator"),
        Some(json!({ "end_time": "2025-05-10T05:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &activity_uri,
        Some("stranger"),
        Some(json!({ "name": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/activities/missing",
        Some("creator"),
        Some(json!({ "name": "Nothing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, attendee) = call(
        &app,
        Method::POST,
        &format!("/api/events/{}/attendees", event_id),
        Some("creator"),
        Some(json!({ "full_name": "Asha Rai", "organization": "Acme", "role": "participant" })),
    )
    .await;
    let attendee_uri = format!("/api/attendees/{}", attendee["attendee_id"].as_str().unwrap());

    let (status, fetched) = call(&app, Method::GET, &attendee_uri, Some("creator"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["badge_id"], "participant-1");

    let (status, _) = call(&app, Method::GET, &attendee_uri, Some("stranger"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
