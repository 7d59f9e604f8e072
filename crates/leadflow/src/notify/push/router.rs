use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info};

use super::{
    broadcast, parse_subscription, PushGateway, PushMessage, PushSubscriptionRepository,
};
use crate::auth::AdminGuard;
use crate::error::LeadflowError;
use crate::storage::run_blocking;

/// Handler state for subscription management and admin broadcasts.
pub struct PushRouterState<S, G> {
    pub subscriptions: Arc<S>,
    pub gateway: Option<Arc<G>>,
    pub guard: AdminGuard,
}

impl<S, G> Clone for PushRouterState<S, G> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
            gateway: self.gateway.clone(),
            guard: self.guard.clone(),
        }
    }
}

pub fn push_router<S, G>(state: PushRouterState<S, G>) -> Router
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    Router::new()
        .route(
            "/api/push-subscriptions",
            post(subscribe_handler::<S, G>).delete(unsubscribe_handler::<S, G>),
        )
        .route("/api/send-push", post(send_push_handler::<S, G>))
        .with_state(state)
}

fn body_object(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

pub(crate) async fn subscribe_handler<S, G>(
    State(state): State<PushRouterState<S, G>>,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    let payload = body_object(&body);
    let (subscription, blob) = parse_subscription(payload.get("subscription"))
        .map_err(|err| LeadflowError::Validation(err.to_string()))?;

    let subscriptions = Arc::clone(&state.subscriptions);
    let record = run_blocking(move || subscriptions.upsert(&subscription.endpoint, &blob))
        .await
        .map_err(|err| {
            error!(error = %err, "failed to store push subscription");
            LeadflowError::Dependency("Failed to store subscription".to_string())
        })?;
    info!(subscription_id = %record.id, "push subscription stored");

    Ok(Json(json!({ "success": true })).into_response())
}

pub(crate) async fn unsubscribe_handler<S, G>(
    State(state): State<PushRouterState<S, G>>,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    let payload = body_object(&body);
    let (subscription, _) = parse_subscription(payload.get("subscription"))
        .map_err(|err| LeadflowError::Validation(err.to_string()))?;

    let subscriptions = Arc::clone(&state.subscriptions);
    let changed = run_blocking(move || subscriptions.deactivate_endpoint(&subscription.endpoint))
        .await
        .map_err(|err| {
            error!(error = %err, "failed to deactivate push subscription");
            LeadflowError::Dependency("Failed to remove subscription".to_string())
        })?;
    info!(changed, "push subscription deactivated");

    Ok(Json(json!({ "success": true })).into_response())
}

pub(crate) async fn send_push_handler<S, G>(
    State(state): State<PushRouterState<S, G>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    state.guard.authorize(&headers)?;

    let payload = body_object(&body);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .ok_or_else(|| LeadflowError::Validation("Message required".to_string()))?;

    let Some(gateway) = state.gateway.as_deref() else {
        return Err(LeadflowError::Dependency(
            "Push notifications are not configured".to_string(),
        ));
    };

    let summary = broadcast(state.subscriptions.as_ref(), gateway, &PushMessage::now(message))
        .await
        .map_err(|err| {
            error!(error = %err, "push broadcast failed");
            LeadflowError::Dependency("Failed to send notifications".to_string())
        })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": summary.message(),
            "attempted": summary.attempted,
            "delivered": summary.delivered,
            "deactivated": summary.deactivated,
        })),
    )
        .into_response())
}
