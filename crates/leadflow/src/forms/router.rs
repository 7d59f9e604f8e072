use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::error;

use super::catalog::{CatalogError, FormCatalog};
use super::domain::{FormDefinition, FormSchema, FormUpdate};
use super::repository::{FormRepository, RepositoryError};
use crate::auth::AdminGuard;
use crate::error::LeadflowError;
use crate::storage::run_blocking;

pub struct FormRouterState<R> {
    pub catalog: Arc<FormCatalog<R>>,
    pub guard: AdminGuard,
}

impl<R> Clone for FormRouterState<R> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            guard: self.guard.clone(),
        }
    }
}

/// Public slug lookup plus the admin form management endpoints.
pub fn form_router<R>(state: FormRouterState<R>) -> Router
where
    R: FormRepository + 'static,
{
    Router::new()
        .route("/api/forms/:slug", get(resolve_handler::<R>))
        .route(
            "/api/admin/forms",
            get(list_handler::<R>).post(create_handler::<R>),
        )
        .route("/api/admin/forms/:slug", put(update_handler::<R>))
        .route("/api/admin/forms/:slug/active", patch(set_active_handler::<R>))
        .with_state(state)
}

impl From<CatalogError> for LeadflowError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotFound | CatalogError::Repository(RepositoryError::NotFound) => {
                LeadflowError::NotFound("Form not found".to_string())
            }
            CatalogError::Conflict(_) | CatalogError::Repository(RepositoryError::Conflict) => {
                LeadflowError::Conflict(value.to_string())
            }
            CatalogError::Invalid(err) => LeadflowError::Validation(err.to_string()),
            CatalogError::Repository(err) => {
                error!(error = %err, "form catalog operation failed");
                LeadflowError::Dependency("Internal server error".to_string())
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, LeadflowError> {
    serde_json::from_slice(body)
        .map_err(|err| LeadflowError::Validation(format!("Invalid form data: {err}")))
}

pub(crate) async fn resolve_handler<R>(
    State(state): State<FormRouterState<R>>,
    Path(slug): Path<String>,
) -> Result<Json<FormSchema>, LeadflowError>
where
    R: FormRepository + 'static,
{
    let catalog = Arc::clone(&state.catalog);
    Ok(Json(run_blocking(move || catalog.resolve(&slug)).await?))
}

#[derive(Debug, Serialize)]
struct FormListResponse {
    forms: Vec<FormSchema>,
}

pub(crate) async fn list_handler<R>(
    State(state): State<FormRouterState<R>>,
    headers: HeaderMap,
) -> Result<Response, LeadflowError>
where
    R: FormRepository + 'static,
{
    state.guard.authorize(&headers)?;
    let catalog = Arc::clone(&state.catalog);
    let forms = run_blocking(move || catalog.list()).await?;
    Ok(Json(FormListResponse { forms }).into_response())
}

pub(crate) async fn create_handler<R>(
    State(state): State<FormRouterState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: FormRepository + 'static,
{
    state.guard.authorize(&headers)?;
    let definition: FormDefinition = parse_body(&body)?;
    let catalog = Arc::clone(&state.catalog);
    let form = run_blocking(move || catalog.create(definition)).await?;
    Ok((StatusCode::CREATED, Json(form)).into_response())
}

pub(crate) async fn update_handler<R>(
    State(state): State<FormRouterState<R>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: FormRepository + 'static,
{
    state.guard.authorize(&headers)?;
    let update: FormUpdate = parse_body(&body)?;
    let catalog = Arc::clone(&state.catalog);
    let form = run_blocking(move || catalog.update(&slug, update)).await?;
    Ok(Json(form).into_response())
}

#[derive(Debug, Deserialize)]
struct ActiveRequest {
    active: bool,
}

pub(crate) async fn set_active_handler<R>(
    State(state): State<FormRouterState<R>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<Response, LeadflowError>
where
    R: FormRepository + 'static,
{
    state.guard.authorize(&headers)?;
    let request: ActiveRequest = parse_body(&body)?;
    let catalog = Arc::clone(&state.catalog);
    let form = run_blocking(move || catalog.set_active(&slug, request.active)).await?;
    Ok(Json(form).into_response())
}
