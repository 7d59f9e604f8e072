use std::sync::Arc;

use axum::response::Response;
use serde_json::{json, Value};

use crate::auth::AdminGuard;
use crate::forms::{form_router, FormCatalog, FormDefinition, FormRouterState, SqliteFormRepository};

pub(super) const ADMIN_KEY: &str = "forms-admin-key";

pub(super) fn loan_definition_json(slug: &str, active: bool) -> Value {
    json!({
        "name": "Business Loan",
        "slug": slug,
        "description": "Working capital for small businesses",
        "is_active": active,
        "fields": [
            { "name": "name", "type": "text", "label": "Full name", "required": true },
            { "name": "phone", "type": "tel", "label": "Mobile", "required": true, "placeholder": "98765 43210" },
            { "name": "turnover", "type": "number", "label": "Annual turnover", "required": false },
            { "name": "sector", "type": "select", "label": "Sector", "required": true, "options": ["Retail", "Manufacturing"] },
        ],
    })
}

pub(super) fn loan_definition(slug: &str, active: bool) -> FormDefinition {
    serde_json::from_value(loan_definition_json(slug, active)).expect("valid definition")
}

pub(super) fn catalog() -> (FormCatalog<SqliteFormRepository>, Arc<SqliteFormRepository>) {
    let repository = Arc::new(SqliteFormRepository::in_memory());
    (FormCatalog::new(repository.clone()), repository)
}

pub(super) fn router_with(catalog: FormCatalog<SqliteFormRepository>) -> axum::Router {
    form_router(FormRouterState {
        catalog: Arc::new(catalog),
        guard: AdminGuard::new(Some(ADMIN_KEY)),
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
