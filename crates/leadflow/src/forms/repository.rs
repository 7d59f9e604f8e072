use chrono::{DateTime, Utc};

use super::domain::FormSchema;
pub use crate::storage::RepositoryError;

pub trait FormRepository: Send + Sync {
    /// Store a new form; a taken slug yields [`RepositoryError::Conflict`].
    fn insert(&self, form: FormSchema) -> Result<FormSchema, RepositoryError>;
    fn fetch_by_slug(&self, slug: &str) -> Result<Option<FormSchema>, RepositoryError>;
    /// Every form, active or not, ordered by name.
    fn list(&self) -> Result<Vec<FormSchema>, RepositoryError>;
    /// Overwrite name, description and fields of the form with the same slug.
    fn update(&self, form: &FormSchema) -> Result<(), RepositoryError>;
    /// Returns `false` when no form carries `slug`.
    fn set_active(&self, slug: &str, active: bool, at: DateTime<Utc>)
        -> Result<bool, RepositoryError>;
}
