use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ride_dispatch::api::rest::router;
use ride_dispatch::config::Config;
use ride_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&Config::default()));
    (router(state.clone()), state)
}

struct TestUser {
    id: Uuid,
    role: &'static str,
}

fn passenger() -> TestUser {
    TestUser {
        id: Uuid::new_v4(),
        role: "passenger",
    }
}

fn driver_user() -> TestUser {
    TestUser {
        id: Uuid::new_v4(),
        role: "driver",
    }
}

fn admin() -> TestUser {
    TestUser {
        id: Uuid::new_v4(),
        role: "admin",
    }
}

fn request(method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user.id.to_string())
        .header("x-user-role", user.role)
        .header("content-type", "application/json");

    match body {
        Some(body) => builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register_driver(app: &axum::Router, owner: &TestUser) -> String {
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/drivers",
            &admin(),
            Some(json!({
                "user_id": owner.id,
                "vehicle_type": "jeepney",
                "verified": true
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    body["id"].as_str().unwrap().to_string()
}

async fn request_ride(app: &axum::Router, rider: &TestUser) -> Value {
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/rides",
            rider,
            Some(json!({
                "pickup": { "lat": 14.60, "lng": 120.98 },
                "destination": { "lat": 14.65, "lng": 121.03 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let res = app
        .oneshot(request("GET", "/health", &admin(), None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rides"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let res = app
        .oneshot(request("GET", "/metrics", &admin(), None))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);

    let content_type = res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(res).await;
    assert!(body.contains("active_rides"));
}

#[tokio::test]
async fn missing_auth_headers_is_rejected() {
    let (app, _state) = setup();
    let res = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Health itself is open, so probe a guarded route instead.
    assert_eq!(res.status(), StatusCode::OK);

    let (app, _state) = setup();
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rides")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "pickup": { "lat": 14.60, "lng": 120.98 },
                        "destination": { "lat": 14.65, "lng": 121.03 }
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn request_ride_starts_waiting() {
    let (app, _state) = setup();
    let rider = passenger();

    let ride = request_ride(&app, &rider).await;
    assert_eq!(ride["status"], "waiting");
    assert!(ride["driver_id"].is_null());
    assert_eq!(ride["requester_id"], rider.id.to_string());
    assert!(ride["requested_at"].is_string());
}

#[tokio::test]
async fn invalid_pickup_location_is_rejected() {
    let (app, _state) = setup();
    let res = app
        .oneshot(request(
            "POST",
            "/rides",
            &passenger(),
            Some(json!({
                "pickup": { "lat": 95.0, "lng": 120.98 },
                "destination": { "lat": 14.65, "lng": 121.03 }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_ride_returns_404() {
    let (app, _state) = setup();
    let fake_id = Uuid::new_v4();
    let res = app
        .oneshot(request("GET", &format!("/rides/{fake_id}"), &admin(), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stranger_cannot_read_another_riders_ride() {
    let (app, _state) = setup();
    let ride = request_ride(&app, &passenger()).await;
    let ride_id = ride["id"].as_str().unwrap();

    let res = app
        .oneshot(request(
            "GET",
            &format!("/rides/{ride_id}"),
            &passenger(),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn driver_onboarding_is_admin_only() {
    let (app, _state) = setup();
    let res = app
        .oneshot(request(
            "POST",
            "/drivers",
            &passenger(),
            Some(json!({ "user_id": Uuid::new_v4() })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_driver_status_returns_400() {
    let (app, _state) = setup();
    let owner = driver_user();
    let driver_id = register_driver(&app, &owner).await;

    let res = app
        .oneshot(request(
            "PATCH",
            &format!("/drivers/{driver_id}/status"),
            &owner,
            Some(json!({ "status": "napping" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("invalid status"));
}

#[tokio::test]
async fn nearby_finds_driver_within_radius_with_distance() {
    let (app, _state) = setup();
    let owner = driver_user();
    let driver_id = register_driver(&app, &owner).await;

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/drivers/{driver_id}/location"),
            &owner,
            Some(json!({ "location": { "lat": 14.601, "lng": 120.981 } })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(request(
            "GET",
            "/drivers/nearby?lat=14.60&lng=120.98&radius_m=500",
            &passenger(),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], driver_id);
    assert!(list[0]["distance_m"].as_f64().unwrap() <= 500.0);
}

#[tokio::test]
async fn nearby_is_empty_outside_radius() {
    let (app, _state) = setup();
    let owner = driver_user();
    let driver_id = register_driver(&app, &owner).await;

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/drivers/{driver_id}/location"),
            &owner,
            Some(json!({ "location": { "lat": 14.62, "lng": 120.99 } })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(request(
            "GET",
            "/drivers/nearby?lat=14.60&lng=120.98&radius_m=500",
            &passenger(),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn full_ride_lifecycle_over_rest() {
    let (app, _state) = setup();
    let rider = passenger();
    let owner = driver_user();
    let driver_id = register_driver(&app, &owner).await;

    let ride = request_ride(&app, &rider).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    // Driver self-selects after seeing the broadcast.
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/rides/{ride_id}/assign"),
            &owner,
            Some(json!({ "driver_id": driver_id })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let assigned = body_json(res).await;
    assert_eq!(assigned["status"], "assigned");
    assert_eq!(assigned["driver_id"], driver_id);
    assert!(assigned["assigned_at"].is_string());

    for status in ["picked_up", "in_progress"] {
        let res = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/rides/{ride_id}/status"),
                &owner,
                Some(json!({ "status": status })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["status"], status);
    }

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/rides/{ride_id}/status"),
            &owner,
            Some(json!({ "status": "completed", "rating": 5, "feedback": "salamat" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let completed = body_json(res).await;
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["rating"], 5);
    assert!(!completed["duration_seconds"].is_null());

    // The requester can retrieve the terminal ride from history.
    let res = app
        .clone()
        .oneshot(request("GET", &format!("/rides/{ride_id}"), &rider, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Channel 2 kept the rider in the loop while disconnected.
    let res = app
        .clone()
        .oneshot(request("GET", "/notifications", &rider, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let notifications = body_json(res).await;
    let list = notifications.as_array().unwrap();
    assert!(list
        .iter()
        .any(|n| n["kind"] == "driver_assigned" && n["read"] == false));
    assert!(list.iter().any(|n| n["kind"] == "ride_status_update"));

    let first_id = list[0]["id"].as_str().unwrap();
    let res = app
        .oneshot(request(
            "POST",
            &format!("/notifications/{first_id}/read"),
            &rider,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn illegal_jump_is_rejected_with_allowed_transitions() {
    let (app, _state) = setup();
    let ride = request_ride(&app, &passenger()).await;
    let ride_id = ride["id"].as_str().unwrap();

    let res = app
        .oneshot(request(
            "PATCH",
            &format!("/rides/{ride_id}/status"),
            &admin(),
            Some(json!({ "status": "in_progress" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let body = body_json(res).await;
    assert_eq!(body["from"], "waiting");
    assert_eq!(body["attempted"], "in_progress");
    assert_eq!(body["allowed"], json!(["assigned", "cancelled"]));
}

#[tokio::test]
async fn cancelled_ride_is_no_longer_assignable() {
    let (app, _state) = setup();
    let rider = passenger();
    let owner = driver_user();
    let driver_id = register_driver(&app, &owner).await;

    let ride = request_ride(&app, &rider).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/rides/{ride_id}/cancel"),
            &rider,
            Some(json!({ "reason": "waited too long" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled = body_json(res).await;
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancelled_by"], "passenger");
    assert_eq!(cancelled["cancel_reason"], "waited too long");

    let res = app
        .oneshot(request(
            "POST",
            &format!("/rides/{ride_id}/assign"),
            &owner,
            Some(json!({ "driver_id": driver_id })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn broadcast_is_admin_only_and_reports_delivery() {
    let (app, _state) = setup();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/broadcast",
            &passenger(),
            Some(json!({ "message": "service advisory" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .oneshot(request(
            "POST",
            "/broadcast",
            &admin(),
            Some(json!({ "message": "service advisory" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let report = body_json(res).await;
    let attempts = report["attempts"].as_array().unwrap();
    assert!(!attempts.is_empty());
    // Live broadcast and mobile push both fire; nothing is persisted for a
    // broadcast target.
    assert!(attempts
        .iter()
        .any(|a| a["channel"] == "push" && a["result"]["outcome"] == "delivered"));
    assert!(attempts
        .iter()
        .any(|a| a["channel"] == "persisted" && a["result"]["outcome"] == "skipped"));
}

#[tokio::test]
async fn marking_unknown_notification_returns_404() {
    let (app, _state) = setup();
    let fake_id = Uuid::new_v4();
    let res = app
        .oneshot(request(
            "POST",
            &format!("/notifications/{fake_id}/read"),
            &passenger(),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
