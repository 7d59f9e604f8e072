use chrono::{DateTime, Utc};

use super::domain::{Lead, LeadId, LeadStatus};
pub use crate::storage::RepositoryError;

/// Storage abstraction so the intake and admin services can be exercised in isolation.
pub trait LeadRepository: Send + Sync {
    /// Store a new lead. Duplicate identifiers or a violated email uniqueness
    /// rule yield [`RepositoryError::Conflict`].
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    /// All leads, newest first.
    fn list(&self) -> Result<Vec<Lead>, RepositoryError>;
    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    /// Overwrite the mutable fields of an existing lead.
    fn update(&self, lead: &Lead) -> Result<(), RepositoryError>;
    /// Set one status on every listed lead atomically, returning the number of rows touched.
    fn update_status_many(
        &self,
        ids: &[LeadId],
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
    /// Remove one lead, reporting whether it existed.
    fn delete(&self, id: &LeadId) -> Result<bool, RepositoryError>;
    fn delete_many(&self, ids: &[LeadId]) -> Result<usize, RepositoryError>;
    fn delete_all(&self) -> Result<usize, RepositoryError>;
}
