//! Web Push subscriptions and broadcast fan-out.

mod gateway;
mod router;
mod sqlite;
mod web;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub use crate::storage::RepositoryError;
pub use gateway::{PushDeliveryError, PushGateway};
pub use router::{push_router, PushRouterState};
pub use sqlite::{SqlitePushSubscriptionRepository, SUBSCRIPTIONS_SCHEMA};
pub use web::WebPushGateway;

/// Browser subscription as produced by `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription data required")]
    Missing,
    #[error("Invalid subscription: {0}")]
    Malformed(String),
}

/// Accept either the JSON-encoded string browsers send or an object.
/// Returns the structured payload plus the blob to store verbatim.
pub fn parse_subscription(
    raw: Option<&Value>,
) -> Result<(SubscriptionPayload, Value), SubscriptionError> {
    let blob = match raw {
        None | Some(Value::Null) => return Err(SubscriptionError::Missing),
        Some(Value::String(text)) if text.trim().is_empty() => {
            return Err(SubscriptionError::Missing)
        }
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|err| SubscriptionError::Malformed(err.to_string()))?,
        Some(other) => other.clone(),
    };

    let payload = SubscriptionPayload {
        endpoint: string_at(&blob, &["endpoint"])?,
        p256dh: string_at(&blob, &["keys", "p256dh"])?,
        auth: string_at(&blob, &["keys", "auth"])?,
    };
    Ok((payload, blob))
}

fn string_at(blob: &Value, path: &[&str]) -> Result<String, SubscriptionError> {
    let missing = || SubscriptionError::Malformed(format!("missing {}", path.join(".")));
    let mut cursor = blob;
    for key in path {
        cursor = cursor.get(*key).ok_or_else(missing)?;
    }
    cursor
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(missing)
}

/// Stored subscription. The payload is write-once; only `active` changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PushSubscriptionRecord {
    pub id: String,
    pub endpoint: String,
    pub subscription: Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PushSubscriptionRecord {
    pub fn payload(&self) -> Result<SubscriptionPayload, SubscriptionError> {
        parse_subscription(Some(&self.subscription)).map(|(payload, _)| payload)
    }
}

/// Storage abstraction for push subscriptions.
pub trait PushSubscriptionRepository: Send + Sync {
    /// Store a subscription, or re-activate the existing one for the same endpoint.
    fn upsert(&self, endpoint: &str, subscription: &Value) -> Result<PushSubscriptionRecord, RepositoryError>;
    fn list_active(&self) -> Result<Vec<PushSubscriptionRecord>, RepositoryError>;
    fn deactivate(&self, id: &str) -> Result<bool, RepositoryError>;
    /// Returns the number of subscriptions switched off.
    fn deactivate_endpoint(&self, endpoint: &str) -> Result<usize, RepositoryError>;
}

/// Process-local subscription store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPushSubscriptions {
    records: Arc<Mutex<BTreeMap<String, PushSubscriptionRecord>>>,
}

impl InMemoryPushSubscriptions {
    pub fn snapshot(&self) -> Vec<PushSubscriptionRecord> {
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}

impl PushSubscriptionRepository for InMemoryPushSubscriptions {
    fn upsert(&self, endpoint: &str, subscription: &Value) -> Result<PushSubscriptionRecord, RepositoryError> {
        let mut records = self.records.lock();
        if let Some(existing) = records.values_mut().find(|record| record.endpoint == endpoint) {
            existing.active = true;
            return Ok(existing.clone());
        }
        let record = PushSubscriptionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint: endpoint.to_string(),
            subscription: subscription.clone(),
            active: true,
            created_at: Utc::now(),
        };
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn list_active(&self) -> Result<Vec<PushSubscriptionRecord>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|record| record.active)
            .collect())
    }

    fn deactivate(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut records = self.records.lock();
        match records.get_mut(id) {
            Some(record) if record.active => {
                record.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn deactivate_endpoint(&self, endpoint: &str) -> Result<usize, RepositoryError> {
        let mut records = self.records.lock();
        let mut changed = 0;
        for record in records.values_mut() {
            if record.endpoint == endpoint && record.active {
                record.active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Notification body delivered to the service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub message: String,
    pub timestamp: String,
}

impl PushMessage {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Aggregated outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushBroadcastSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub deactivated: usize,
}

impl PushBroadcastSummary {
    pub fn message(&self) -> String {
        if self.attempted == 0 {
            return "No active subscriptions".to_string();
        }
        format!("Sent to {}/{} subscribers", self.delivered, self.attempted)
    }
}

/// Deliver `message` to every active subscription concurrently. A gone
/// endpoint is deactivated; any other failure only counts against `delivered`.
pub async fn broadcast<S, G>(
    subscriptions: &S,
    gateway: &G,
    message: &PushMessage,
) -> Result<PushBroadcastSummary, RepositoryError>
where
    S: PushSubscriptionRepository + ?Sized,
    G: PushGateway + ?Sized,
{
    let active = subscriptions.list_active()?;
    let body = serde_json::to_vec(message)
        .map_err(|err| RepositoryError::Unavailable(format!("failed to encode push payload: {err}")))?;

    let deliveries = active.iter().map(|record| {
        let body = body.as_slice();
        async move {
            let payload = match record.payload() {
                Ok(payload) => payload,
                Err(err) => return Err(PushDeliveryError::InvalidSubscription(err.to_string())),
            };
            gateway.deliver(&payload, body).await
        }
    });
    let outcomes = join_all(deliveries).await;

    let mut summary = PushBroadcastSummary {
        attempted: active.len(),
        ..PushBroadcastSummary::default()
    };
    for (record, outcome) in active.iter().zip(outcomes) {
        match outcome {
            Ok(()) => summary.delivered += 1,
            Err(err) if err.is_gone() => match subscriptions.deactivate(&record.id) {
                Ok(true) => {
                    summary.deactivated += 1;
                    info!(subscription_id = %record.id, "push endpoint gone, subscription deactivated");
                }
                Ok(false) => {}
                Err(store_err) => {
                    warn!(subscription_id = %record.id, error = %store_err, "failed to deactivate gone subscription");
                }
            },
            Err(err) => {
                warn!(subscription_id = %record.id, error = %err, "push delivery failed");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::collections::HashSet;

    struct ScriptedGateway {
        gone: HashSet<String>,
        failing: HashSet<String>,
        delivered: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn new(gone: &[&str], failing: &[&str]) -> Self {
            Self {
                gone: gone.iter().map(|s| s.to_string()).collect(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl PushGateway for ScriptedGateway {
        fn deliver<'a>(
            &'a self,
            subscription: &'a SubscriptionPayload,
            _payload: &'a [u8],
        ) -> BoxFuture<'a, Result<(), PushDeliveryError>> {
            Box::pin(async move {
                if self.gone.contains(&subscription.endpoint) {
                    return Err(PushDeliveryError::Gone);
                }
                if self.failing.contains(&subscription.endpoint) {
                    return Err(PushDeliveryError::Failed("503".to_string()));
                }
                self.delivered.lock().push(subscription.endpoint.clone());
                Ok(())
            })
        }
    }

    fn blob(endpoint: &str) -> Value {
        json!({
            "endpoint": endpoint,
            "expirationTime": null,
            "keys": { "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM", "auth": "tBHItJI5svbpez7KI4CCXg" }
        })
    }

    fn subscribe(store: &InMemoryPushSubscriptions, endpoint: &str) -> PushSubscriptionRecord {
        let (payload, blob) = parse_subscription(Some(&blob(endpoint))).expect("valid");
        store.upsert(&payload.endpoint, &blob).expect("stored")
    }

    #[test]
    fn parses_stringified_and_object_subscriptions() {
        let object = blob("https://push.example/a");
        let text = Value::String(object.to_string());

        let (from_object, stored) = parse_subscription(Some(&object)).expect("object form");
        let (from_string, _) = parse_subscription(Some(&text)).expect("string form");
        assert_eq!(from_object, from_string);
        assert_eq!(stored, object);
        assert_eq!(from_object.auth, "tBHItJI5svbpez7KI4CCXg");
    }

    #[test]
    fn rejects_missing_or_incomplete_subscriptions() {
        assert_eq!(parse_subscription(None), Err(SubscriptionError::Missing));
        assert_eq!(
            parse_subscription(Some(&json!(""))),
            Err(SubscriptionError::Missing)
        );
        assert!(matches!(
            parse_subscription(Some(&json!({ "endpoint": "https://push.example/a" }))),
            Err(SubscriptionError::Malformed(_))
        ));
        assert!(matches!(
            parse_subscription(Some(&json!("{not json"))),
            Err(SubscriptionError::Malformed(_))
        ));
    }

    #[test]
    fn resubscribing_reactivates_the_same_record() {
        let store = InMemoryPushSubscriptions::default();
        let first = subscribe(&store, "https://push.example/a");
        assert_eq!(store.deactivate_endpoint("https://push.example/a").expect("ok"), 1);
        let second = subscribe(&store, "https://push.example/a");
        assert_eq!(first.id, second.id);
        assert!(second.active);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn gone_endpoint_is_deactivated_and_others_still_count() {
        let store = InMemoryPushSubscriptions::default();
        let ok = subscribe(&store, "https://push.example/ok");
        let gone = subscribe(&store, "https://push.example/gone");
        let flaky = subscribe(&store, "https://push.example/flaky");
        let gateway = ScriptedGateway::new(&["https://push.example/gone"], &["https://push.example/flaky"]);

        let summary = broadcast(&store, &gateway, &PushMessage::now("hello"))
            .await
            .expect("broadcast runs");

        assert_eq!(
            summary,
            PushBroadcastSummary {
                attempted: 3,
                delivered: 1,
                deactivated: 1
            }
        );
        assert_eq!(summary.message(), "Sent to 1/3 subscribers");

        let states: BTreeMap<_, _> = store
            .snapshot()
            .into_iter()
            .map(|record| (record.id, record.active))
            .collect();
        assert!(states[&ok.id]);
        assert!(!states[&gone.id]);
        assert!(states[&flaky.id]);
        assert_eq!(*gateway.delivered.lock(), vec![ok.endpoint]);
    }

    #[tokio::test]
    async fn empty_broadcast_reports_no_subscribers() {
        let store = InMemoryPushSubscriptions::default();
        let gateway = ScriptedGateway::new(&[], &[]);
        let summary = broadcast(&store, &gateway, &PushMessage::now("hello"))
            .await
            .expect("broadcast runs");
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.message(), "No active subscriptions");
    }
}
