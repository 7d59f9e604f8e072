use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{Lead, LeadId};
use super::repository::{LeadRepository, RepositoryError};
use super::validation::{LeadSubmission, LeadValidationError};
use crate::notify::{LeadNotifier, LeadSummary};

/// Public intake: validate, normalize, persist, then hand the lead to the notifier.
pub struct LeadIntakeService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> LeadIntakeService<R, N>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Store a validated submission. Notification dispatch never affects the result.
    pub fn submit(&self, submission: &LeadSubmission) -> Result<Lead, IntakeError> {
        let lead = submission
            .validate()?
            .into_lead(LeadId::generate(), Utc::now());

        let stored = self.repository.insert(lead)?;
        info!(lead_id = %stored.id, source = %stored.source, "lead captured");

        self.notifier.lead_captured(LeadSummary::from(&stored));
        Ok(stored)
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] LeadValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
