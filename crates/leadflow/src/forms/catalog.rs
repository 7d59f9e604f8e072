use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{FormDefinition, FormSchema, FormUpdate, FormValidationError};
use super::repository::{FormRepository, RepositoryError};

/// Outcome of an import upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Slug-addressed form catalog. Only active forms are served publicly.
pub struct FormCatalog<R> {
    repository: Arc<R>,
}

impl<R> FormCatalog<R>
where
    R: FormRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn resolve(&self, slug: &str) -> Result<FormSchema, CatalogError> {
        self.repository
            .fetch_by_slug(slug)?
            .filter(|form| form.is_active)
            .ok_or(CatalogError::NotFound)
    }

    pub fn list(&self) -> Result<Vec<FormSchema>, CatalogError> {
        Ok(self.repository.list()?)
    }

    pub fn create(&self, definition: FormDefinition) -> Result<FormSchema, CatalogError> {
        definition.validate()?;
        let slug = definition.slug.clone();
        let form = self
            .repository
            .insert(definition.into_schema(Utc::now()))
            .map_err(|err| match err {
                RepositoryError::Conflict => CatalogError::Conflict(slug),
                other => CatalogError::Repository(other),
            })?;
        info!(slug = %form.slug, fields = form.fields.len(), "form created");
        Ok(form)
    }

    pub fn update(&self, slug: &str, update: FormUpdate) -> Result<FormSchema, CatalogError> {
        update.validate()?;
        let mut form = self.fetch(slug)?;
        update.apply(&mut form, Utc::now());
        self.repository.update(&form)?;
        info!(slug = %form.slug, fields = form.fields.len(), "form updated");
        Ok(form)
    }

    pub fn set_active(&self, slug: &str, active: bool) -> Result<FormSchema, CatalogError> {
        if !self.repository.set_active(slug, active, Utc::now())? {
            return Err(CatalogError::NotFound);
        }
        info!(slug, active, "form activity changed");
        self.fetch(slug)
    }

    /// Create the form, or overwrite the existing one with the same slug and
    /// bring its activity in line with the definition.
    pub fn upsert(
        &self,
        definition: FormDefinition,
    ) -> Result<(FormSchema, UpsertOutcome), CatalogError> {
        definition.validate()?;
        if self.repository.fetch_by_slug(&definition.slug)?.is_none() {
            return Ok((self.create(definition)?, UpsertOutcome::Created));
        }

        let update = FormUpdate::from(&definition);
        self.update(&definition.slug, update)?;
        let form = self.set_active(&definition.slug, definition.is_active)?;
        Ok((form, UpsertOutcome::Updated))
    }

    fn fetch(&self, slug: &str) -> Result<FormSchema, CatalogError> {
        self.repository
            .fetch_by_slug(slug)?
            .ok_or(CatalogError::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Form not found")]
    NotFound,
    #[error("A form with slug '{0}' already exists")]
    Conflict(String),
    #[error(transparent)]
    Invalid(#[from] FormValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
