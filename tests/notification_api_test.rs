// Integration tests for the SMF notification endpoint

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use nef::api::{create_router, NefAppState};
use nef::config::CoreConfig;
use nef::model::EventNotification;
use nef::notification::{AfNotifier, NotificationRouter};
use nef::registry::AfRegistry;
use nef::southbound::{EmulatedSouthbound, Southbound};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

const NOTIFY_PATH: &str = "/3gpp-traffic-influence/v1/notification/upf";

/// Hands every AF notification to the test over a channel
struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(String, EventNotification)>,
}

#[async_trait]
impl AfNotifier for ChannelNotifier {
    async fn notify(
        &self,
        destination: &str,
        notification: &EventNotification,
    ) -> anyhow::Result<()> {
        self.tx
            .send((destination.to_string(), notification.clone()))
            .map_err(|_| anyhow::anyhow!("receiver dropped"))
    }
}

fn create_test_app() -> (Router, mpsc::UnboundedReceiver<(String, EventNotification)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let emulated = Arc::new(EmulatedSouthbound::new());
    let registry = Arc::new(AfRegistry::new(
        CoreConfig::default(),
        Southbound::new(emulated.clone(), emulated.clone(), emulated),
    ));
    let notifications = Arc::new(NotificationRouter::new(
        registry.clone(),
        Arc::new(ChannelNotifier { tx }),
    ));
    let router = create_router(NefAppState {
        registry,
        notifications,
    });
    (router, rx)
}

async fn post(app: &Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn subscribe(app: &Router) {
    let response = post(
        app,
        "/3gpp-traffic-influence/v1/af1/subscriptions",
        json!({
            "afTransId": "77",
            "afServiceId": "svc1",
            "afAppId": "app1",
            "externalGroupId": "group-1",
            "notificationDestination": "http://af.example/notify",
            "subscribedEvents": ["UP_PATH_CHANGE"]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

fn up_path_change(notif_id: &str) -> Value {
    json!({
        "notifId": notif_id,
        "eventNotifs": [{
            "event": "UP_PATH_CH",
            "sourceDnai": "edge-1",
            "targetDnai": "edge-2",
            "dnaiChgType": "EARLY",
            "sourceUeIpv4Addr": "10.45.0.2"
        }]
    })
}

/// A notification carrying a known correlation ID reaches the AF.
#[tokio::test]
async fn test_notification_forwarded_to_af() {
    let (app, mut rx) = create_test_app();
    subscribe(&app).await;

    // First correlation ID of a default registry
    let response = post(&app, NOTIFY_PATH, up_path_change("11131")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (destination, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(destination, "http://af.example/notify");
    assert_eq!(event.af_trans_id.as_deref(), Some("77"));
    assert_eq!(event.subscribed_event, "UP_PATH_CHANGE");
    assert_eq!(event.source_dnai.as_deref(), Some("edge-1"));
    assert_eq!(event.target_dnai.as_deref(), Some("edge-2"));
    assert_eq!(event.src_ue_ipv4_addr.as_deref(), Some("10.45.0.2"));
}

/// Non-numeric correlation IDs are rejected.
#[tokio::test]
async fn test_invalid_notif_id() {
    let (app, _rx) = create_test_app();
    subscribe(&app).await;

    let response = post(&app, NOTIFY_PATH, up_path_change("not-a-number")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Correlation IDs no subscription owns are 404.
#[tokio::test]
async fn test_unknown_correlation_id() {
    let (app, _rx) = create_test_app();
    subscribe(&app).await;

    let response = post(&app, NOTIFY_PATH, up_path_change("999")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Once the subscription is deleted its correlation ID no longer routes.
#[tokio::test]
async fn test_deleted_subscription_stops_routing() {
    let (app, _rx) = create_test_app();
    subscribe(&app).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/3gpp-traffic-influence/v1/af1/subscriptions/11111")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(&app, NOTIFY_PATH, up_path_change("11131")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
