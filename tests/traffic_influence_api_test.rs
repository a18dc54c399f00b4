// Integration tests for the /3gpp-traffic-influence/v1 subscription routes

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use nef::api::{create_router, NefAppState};
use nef::config::CoreConfig;
use nef::notification::{HttpAfNotifier, NotificationRouter};
use nef::registry::AfRegistry;
use nef::southbound::{EmulatedSouthbound, Southbound};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BASE: &str = "/3gpp-traffic-influence/v1";

fn create_test_app() -> Router {
    let emulated = Arc::new(EmulatedSouthbound::new());
    let registry = Arc::new(AfRegistry::new(
        CoreConfig::default(),
        Southbound::new(emulated.clone(), emulated.clone(), emulated),
    ));
    let notifier = Arc::new(HttpAfNotifier::new(Duration::from_secs(1)));
    let notifications = Arc::new(NotificationRouter::new(registry.clone(), notifier));
    create_router(NefAppState {
        registry,
        notifications,
    })
}

fn subscription_body(trans_id: &str) -> Value {
    json!({
        "afTransId": trans_id,
        "afServiceId": "svc1",
        "afAppId": "app1",
        "ipv4Addr": "10.45.0.2",
        "notificationDestination": "http://af.example/notify",
        "subscribedEvents": ["UP_PATH_CHANGE"],
        "trafficRoutes": [{"dnai": "edge-1"}]
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// POST creates the subscription with a Location header and self link.
#[tokio::test]
async fn test_create_subscription_returns_location() {
    let app = create_test_app();

    let response = send(
        &app,
        "POST",
        &format!("{}/af1/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        location,
        "http://localhost:8060/3gpp-traffic-influence/v1/af1/subscriptions/11111"
    );

    let ti = json_body(response).await;
    assert_eq!(ti["self"], location.as_str());
    assert_eq!(ti["afTransId"], "1");
}

/// GET on the collection returns every subscription; unknown AFs get [].
#[tokio::test]
async fn test_list_subscriptions() {
    let app = create_test_app();

    let response = send(&app, "GET", &format!("{}/nobody/subscriptions", BASE), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));

    for trans_id in ["1", "2"] {
        let response = send(
            &app,
            "POST",
            &format!("{}/af1/subscriptions", BASE),
            Some(subscription_body(trans_id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&app, "GET", &format!("{}/af1/subscriptions", BASE), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = json_body(response).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[0]["afTransId"], "1");
    assert_eq!(list[1]["afTransId"], "2");
}

/// Missing mandatory attributes are rejected with a problem document.
#[tokio::test]
async fn test_create_rejects_missing_trans_id() {
    let app = create_test_app();
    let mut body = subscription_body("1");
    body.as_object_mut().unwrap().remove("afTransId");

    let response = send(&app, "POST", &format!("{}/af1/subscriptions", BASE), Some(body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let problem = json_body(response).await;
    assert_eq!(problem["title"], "Missing AfTransID attribute");
    assert_eq!(problem["status"], 400);
}

/// PUT replaces the subscription and keeps its self link, PATCH merges.
#[tokio::test]
async fn test_update_and_patch_subscription() {
    let app = create_test_app();
    let uri = format!("{}/af1/subscriptions/11111", BASE);
    send(
        &app,
        "POST",
        &format!("{}/af1/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;

    let mut replacement = subscription_body("1");
    replacement["trafficRoutes"] = json!([{"dnai": "edge-2"}]);
    let response = send(&app, "PUT", &uri, Some(replacement)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ti = json_body(response).await;
    assert_eq!(ti["trafficRoutes"][0]["dnai"], "edge-2");
    assert_eq!(
        ti["self"],
        "http://localhost:8060/3gpp-traffic-influence/v1/af1/subscriptions/11111"
    );

    let response = send(
        &app,
        "PATCH",
        &uri,
        Some(json!({"appReloInd": true, "trafficRoutes": [{"dnai": "edge-3"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let ti = json_body(send(&app, "GET", &uri, None).await).await;
    assert_eq!(ti["appReloInd"], true);
    assert_eq!(ti["trafficRoutes"][0]["dnai"], "edge-3");
    assert_eq!(ti["afAppId"], "app1");
}

/// DELETE answers 204 and the subscription is gone afterwards.
#[tokio::test]
async fn test_delete_subscription() {
    let app = create_test_app();
    let uri = format!("{}/af1/subscriptions/11111", BASE);
    send(
        &app,
        "POST",
        &format!("{}/af1/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;

    let response = send(&app, "DELETE", &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, "GET", &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Unknown AFs, unknown IDs and non-numeric IDs are all 404.
#[tokio::test]
async fn test_not_found_cases() {
    let app = create_test_app();

    let response = send(&app, "GET", &format!("{}/ghost/subscriptions/11111", BASE), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["title"], "AF entry not present");

    send(
        &app,
        "POST",
        &format!("{}/af1/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;

    let response = send(&app, "GET", &format!("{}/af1/subscriptions/99999", BASE), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["title"], "Subscription Not Found");

    let response = send(&app, "DELETE", &format!("{}/af1/subscriptions/abc", BASE), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// The default AF cap is two; a third AF is refused.
#[tokio::test]
async fn test_af_capacity() {
    let app = create_test_app();

    for af in ["af1", "af2"] {
        let response = send(
            &app,
            "POST",
            &format!("{}/{}/subscriptions", BASE, af),
            Some(subscription_body("1")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(
        &app,
        "POST",
        &format!("{}/af3/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["title"], "MAX AF exceeded");
}

/// GET /health reports the number of live AFs.
#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    send(
        &app,
        "POST",
        &format!("{}/af1/subscriptions", BASE),
        Some(subscription_body("1")),
    )
    .await;

    let response = send(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["afs"], 1);
}
