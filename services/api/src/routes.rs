use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use leadflow::forms::{form_router, FormRepository, FormRouterState};
use leadflow::leads::{lead_router, LeadRepository, LeadRouterState};
use leadflow::notify::push::{push_router, PushGateway, PushRouterState, PushSubscriptionRepository};
use leadflow::notify::LeadNotifier;
use serde_json::json;

/// Every public and admin route plus the operational endpoints.
pub(crate) fn application_router<R, N, F, S, G>(
    leads: LeadRouterState<R, N>,
    forms: FormRouterState<F>,
    push: PushRouterState<S, G>,
) -> Router
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    F: FormRepository + 'static,
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    lead_router(leads)
        .merge(form_router(forms))
        .merge(push_router(push))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
