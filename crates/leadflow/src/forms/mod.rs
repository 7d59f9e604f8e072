//! Admin-defined form schemas served to the public form renderer by slug.

pub mod catalog;
pub mod domain;
pub mod repository;
pub mod router;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, FormCatalog, UpsertOutcome};
pub use domain::{FieldKind, FormDefinition, FormField, FormSchema, FormUpdate, FormValidationError};
pub use repository::{FormRepository, RepositoryError};
pub use router::{form_router, FormRouterState};
pub use sqlite::{form_migrations, SqliteFormRepository, FORMS_SCHEMA};
