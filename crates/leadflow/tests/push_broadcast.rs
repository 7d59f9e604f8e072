//! Push subscription lifecycle against the SQLite store: browsers subscribe
//! through the public route, admins broadcast, and endpoints reported gone
//! are retired without affecting the others.

mod common {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use futures::future::BoxFuture;
    use serde_json::{json, Value};

    use leadflow::notify::push::{PushDeliveryError, PushGateway, SubscriptionPayload};

    /// Gateway that fails for endpoints listed as gone and records the rest.
    #[derive(Default)]
    pub struct FakePushService {
        pub gone: HashSet<String>,
        pub delivered: Mutex<Vec<(String, Value)>>,
    }

    impl FakePushService {
        pub fn with_gone(endpoints: &[&str]) -> Self {
            Self {
                gone: endpoints.iter().map(|endpoint| endpoint.to_string()).collect(),
                delivered: Mutex::new(Vec::new()),
            }
        }

        pub fn delivered_to(&self) -> Vec<String> {
            let mut endpoints: Vec<String> = self
                .delivered
                .lock()
                .expect("delivery mutex poisoned")
                .iter()
                .map(|(endpoint, _)| endpoint.clone())
                .collect();
            endpoints.sort();
            endpoints
        }
    }

    impl PushGateway for FakePushService {
        fn deliver<'a>(
            &'a self,
            subscription: &'a SubscriptionPayload,
            payload: &'a [u8],
        ) -> BoxFuture<'a, Result<(), PushDeliveryError>> {
            Box::pin(async move {
                if self.gone.contains(&subscription.endpoint) {
                    return Err(PushDeliveryError::Gone);
                }
                let body: Value = serde_json::from_slice(payload)
                    .map_err(|err| PushDeliveryError::Failed(err.to_string()))?;
                self.delivered
                    .lock()
                    .expect("delivery mutex poisoned")
                    .push((subscription.endpoint.clone(), body));
                Ok(())
            })
        }
    }

    pub fn subscription(endpoint: &str) -> Value {
        json!({
            "endpoint": endpoint,
            "expirationTime": null,
            "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA", "auth": "tBHItJI5svbpez7KI4CCXg" },
        })
    }

    pub fn subscriptions(db: Arc<leadflow::storage::Database>) -> Arc<leadflow::notify::push::SqlitePushSubscriptionRepository> {
        Arc::new(leadflow::notify::push::SqlitePushSubscriptionRepository::new(db))
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use leadflow::auth::{AdminGuard, ADMIN_KEY_HEADER};
use leadflow::leads::lead_migrations;
use leadflow::notify::push::{
    broadcast, push_router, PushMessage, PushRouterState, PushSubscriptionRepository,
};
use leadflow::storage::Database;
use serde_json::json;
use tower::ServiceExt;

const ADMIN_KEY: &str = "push-admin-key";

#[tokio::test]
async fn gone_endpoint_is_deactivated_and_others_still_delivered() {
    let store = subscriptions(Arc::new(Database::in_memory(lead_migrations(false))));
    for endpoint in [
        "https://push.example/a",
        "https://push.example/b",
        "https://push.example/c",
    ] {
        store
            .upsert(endpoint, &subscription(endpoint))
            .expect("subscription stored");
    }
    let gateway = FakePushService::with_gone(&["https://push.example/b"]);

    let summary = broadcast(store.as_ref(), &gateway, &PushMessage::now("Rates drop today"))
        .await
        .expect("broadcast runs");

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.deactivated, 1);
    assert_eq!(summary.message(), "Sent to 2/3 subscribers");
    assert_eq!(
        gateway.delivered_to(),
        vec!["https://push.example/a", "https://push.example/c"]
    );

    let active: Vec<String> = store
        .list_active()
        .expect("list")
        .into_iter()
        .map(|record| record.endpoint)
        .collect();
    assert_eq!(active.len(), 2);
    assert!(!active.contains(&"https://push.example/b".to_string()));

    let again = broadcast(store.as_ref(), &gateway, &PushMessage::now("second"))
        .await
        .expect("broadcast runs");
    assert_eq!(again.attempted, 2);
    assert_eq!(again.deactivated, 0);
}

#[tokio::test]
async fn subscribe_route_accepts_stringified_subscription_and_admin_broadcasts() {
    let store = subscriptions(Arc::new(Database::in_memory(lead_migrations(false))));
    let gateway = Arc::new(FakePushService::default());
    let router = push_router(PushRouterState {
        subscriptions: store.clone(),
        gateway: Some(gateway.clone()),
        guard: AdminGuard::new(Some(ADMIN_KEY)),
    });

    let encoded = subscription("https://push.example/browser").to_string();
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/push-subscriptions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "subscription": encoded }).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.list_active().expect("list").len(), 1);

    let unauthorized = router
        .clone()
        .oneshot(
            Request::post("/api/send-push")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "hello" }).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/send-push")
                .header(header::CONTENT_TYPE, "application/json")
                .header(ADMIN_KEY_HEADER, ADMIN_KEY)
                .body(Body::from(json!({ "message": "New offers live" }).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json payload");
    assert_eq!(payload["success"], true);
    assert_eq!(payload["message"], "Sent to 1/1 subscribers");

    let delivered = gateway.delivered.lock().expect("delivery mutex poisoned").clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1["message"], "New offers live");

    let response = router
        .oneshot(
            Request::delete("/api/push-subscriptions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "subscription": encoded }).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.list_active().expect("list").is_empty());
}

#[tokio::test]
async fn missing_subscription_and_message_are_rejected() {
    let store = subscriptions(Arc::new(Database::in_memory(lead_migrations(false))));
    let router = push_router(PushRouterState {
        subscriptions: store,
        gateway: Some(Arc::new(FakePushService::default())),
        guard: AdminGuard::new(Some(ADMIN_KEY)),
    });

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/push-subscriptions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(
            Request::post("/api/send-push")
                .header(ADMIN_KEY_HEADER, ADMIN_KEY)
                .body(Body::from(json!({ "message": "   " }).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
