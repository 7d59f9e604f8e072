use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use super::admin::{AdminError, LeadAdminService};
use super::domain::{LeadChanges, LeadId, LeadStatus, LeadView};
use super::export::ExportFormat;
use super::filter::{LeadFilter, LeadQuery};
use super::intake::{IntakeError, LeadIntakeService};
use super::repository::{LeadRepository, RepositoryError};
use super::validation::LeadSubmission;
use crate::auth::AdminGuard;
use crate::error::LeadflowError;
use crate::notify::LeadNotifier;
use crate::storage::run_blocking;

pub(crate) const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS, PATCH"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, x-admin-key",
    ),
];

/// Shared handler state for the public intake and admin lead routes.
pub struct LeadRouterState<R, N> {
    pub intake: Arc<LeadIntakeService<R, N>>,
    pub admin: Arc<LeadAdminService<R>>,
    pub guard: AdminGuard,
}

impl<R, N> Clone for LeadRouterState<R, N> {
    fn clone(&self) -> Self {
        Self {
            intake: Arc::clone(&self.intake),
            admin: Arc::clone(&self.admin),
            guard: self.guard.clone(),
        }
    }
}

/// Router builder exposing intake, admin review and export endpoints.
pub fn lead_router<R, N>(state: LeadRouterState<R, N>) -> Router
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    Router::new()
        .route(
            "/api/leads",
            post(submit_handler::<R, N>)
                .options(preflight_handler)
                .get(list_handler::<R, N>)
                .patch(toggle_done_handler::<R, N>)
                .delete(delete_handler::<R, N>),
        )
        .route("/api/leads/stats", get(stats_handler::<R, N>))
        .route("/api/leads/bulk-status", post(bulk_status_handler::<R, N>))
        .route("/api/leads/:lead_id", patch(update_handler::<R, N>))
        .route("/api/export-leads", get(export_handler::<R, N>))
        .with_state(state)
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

pub(crate) async fn preflight_handler() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn submit_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    body: Bytes,
) -> Response
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    let submission = LeadSubmission::from_json_bytes(&body);
    let intake = Arc::clone(&state.intake);
    let response = match run_blocking(move || intake.submit(&submission)).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "message": "Lead created successfully",
            })),
        )
            .into_response(),
        Err(IntakeError::Validation(err)) => {
            LeadflowError::Validation(err.to_string()).into_response()
        }
        Err(IntakeError::Repository(RepositoryError::Conflict)) => {
            LeadflowError::Conflict("A lead with this email already exists".to_string())
                .into_response()
        }
        Err(IntakeError::Repository(err)) => {
            error!(error = %err, "POST /api/leads failed");
            LeadflowError::Dependency("Unexpected error occurred".to_string()).into_response()
        }
    };
    with_cors(response)
}

impl From<AdminError> for LeadflowError {
    fn from(value: AdminError) -> Self {
        match value {
            AdminError::NotFound | AdminError::Repository(RepositoryError::NotFound) => {
                LeadflowError::NotFound("Lead not found".to_string())
            }
            AdminError::Repository(RepositoryError::Conflict) => {
                LeadflowError::Conflict("A lead with this email already exists".to_string())
            }
            other => {
                error!(error = %other, "lead admin operation failed");
                LeadflowError::Dependency("Unexpected error occurred".to_string())
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, LeadflowError> {
    serde_json::from_slice(body)
        .map_err(|_| LeadflowError::Validation("Invalid request data".to_string()))
}

fn parse_ids(raw: &[String]) -> Vec<LeadId> {
    raw.iter().filter_map(|id| LeadId::parse(id)).collect()
}

fn lead_id(raw: &str) -> Result<LeadId, LeadflowError> {
    LeadId::parse(raw).ok_or_else(|| LeadflowError::NotFound("Lead not found".to_string()))
}

#[derive(Debug, Serialize)]
struct LeadListResponse {
    leads: Vec<LeadView>,
}

pub(crate) async fn list_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    Query(query): Query<LeadQuery>,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let filter = LeadFilter::from_query(&query)?;
    let admin = Arc::clone(&state.admin);
    let leads = run_blocking(move || admin.list(&filter)).await?;
    let payload = LeadListResponse {
        leads: leads.iter().map(|lead| lead.view()).collect(),
    };
    Ok(Json(payload).into_response())
}

#[derive(Debug, Deserialize)]
struct ToggleDoneRequest {
    #[serde(rename = "leadId")]
    lead_id: Option<String>,
    done: Option<bool>,
}

pub(crate) async fn toggle_done_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let request: ToggleDoneRequest = parse_body(&body)?;
    let (Some(raw_id), Some(done)) = (request.lead_id, request.done) else {
        return Err(LeadflowError::Validation("Invalid request data".to_string()));
    };
    let id = lead_id(&raw_id)?;
    let admin = Arc::clone(&state.admin);
    let lead = run_blocking(move || admin.set_done(&id, done)).await?;
    Ok(Json(json!({ "ok": true, "lead": lead.view() })).into_response())
}

pub(crate) async fn update_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let payload: Value = parse_body(&body)?;
    let changes = changes_from_json(&payload)?;
    let id = lead_id(&raw_id)?;
    let admin = Arc::clone(&state.admin);
    let lead = run_blocking(move || admin.update(&id, &changes)).await?;
    Ok(Json(json!({ "ok": true, "lead": lead.view() })).into_response())
}

/// Read `{status?, assignedTo?, notes?}`. `null` or a blank string clears the
/// optional text fields.
fn changes_from_json(payload: &Value) -> Result<LeadChanges, LeadflowError> {
    let Value::Object(fields) = payload else {
        return Err(LeadflowError::Validation("Invalid request data".to_string()));
    };

    let status = match fields.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(
            LeadStatus::parse(raw)
                .ok_or_else(|| LeadflowError::Validation(format!("Unknown status '{raw}'")))?,
        ),
        Some(_) => return Err(LeadflowError::Validation("Invalid status".to_string())),
    };

    Ok(LeadChanges {
        status,
        assigned_to: optional_text(fields.get("assignedTo"), "assignedTo")?,
        notes: optional_text(fields.get("notes"), "notes")?,
    })
}

fn optional_text(value: Option<&Value>, field: &str) -> Result<Option<Option<String>>, LeadflowError> {
    match value {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(text)) => {
            let text = text.trim();
            Ok(Some((!text.is_empty()).then(|| text.to_string())))
        }
        Some(_) => Err(LeadflowError::Validation(format!("Invalid {field}"))),
    }
}

#[derive(Debug, Deserialize)]
struct BulkStatusRequest {
    #[serde(rename = "leadIds", default)]
    lead_ids: Vec<String>,
    status: Option<String>,
}

pub(crate) async fn bulk_status_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let request: BulkStatusRequest = parse_body(&body)?;
    let status = request
        .status
        .as_deref()
        .and_then(LeadStatus::parse)
        .ok_or_else(|| LeadflowError::Validation("Valid status is required".to_string()))?;
    let ids = parse_ids(&request.lead_ids);
    let admin = Arc::clone(&state.admin);
    let updated = run_blocking(move || admin.bulk_update_status(&ids, status)).await?;
    Ok(Json(json!({ "ok": true, "updated": updated })).into_response())
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(rename = "leadId")]
    lead_id: Option<String>,
    #[serde(rename = "leadIds")]
    lead_ids: Option<Vec<String>>,
    #[serde(rename = "deleteAll", default)]
    delete_all: bool,
}

pub(crate) async fn delete_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let request: DeleteRequest = parse_body(&body)?;

    let admin = Arc::clone(&state.admin);
    let deleted = if request.delete_all {
        run_blocking(move || admin.delete_all()).await?
    } else if let Some(ids) = request.lead_ids {
        let ids = parse_ids(&ids);
        run_blocking(move || admin.delete_many(&ids)).await?
    } else if let Some(raw_id) = request.lead_id {
        let id = lead_id(&raw_id)?;
        run_blocking(move || admin.delete(&id)).await?;
        1
    } else {
        return Err(LeadflowError::Validation(
            "Provide leadId, leadIds or deleteAll".to_string(),
        ));
    };

    Ok(Json(json!({ "ok": true, "deleted": deleted })).into_response())
}

pub(crate) async fn stats_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;
    let admin = Arc::clone(&state.admin);
    let stats = run_blocking(move || admin.stats()).await?;
    Ok(Json(stats).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportQuery {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub(crate) async fn export_handler<R, N>(
    State(state): State<LeadRouterState<R, N>>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
) -> Result<Response, LeadflowError>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    state.guard.authorize(&headers)?;

    let format = match query.format.as_deref() {
        None => ExportFormat::Csv,
        Some(raw) => ExportFormat::parse(raw).ok_or_else(|| {
            LeadflowError::Validation(format!("Unsupported export format '{raw}'"))
        })?,
    };
    let filter = LeadFilter::from_query(&LeadQuery {
        range: query.range,
        q: query.q,
        status: query.status,
    })?;

    let admin = Arc::clone(&state.admin);
    let file = run_blocking(move || admin.export(format, &filter)).await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
