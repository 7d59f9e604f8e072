use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::info;

use super::domain::{Lead, LeadChanges, LeadId, LeadStats, LeadStatus};
use super::export::{self, export_filename, ExportError, ExportFile, ExportFormat};
use super::filter::{DateRange, LeadFilter};
use super::repository::{LeadRepository, RepositoryError};

/// Authenticated lead operations: listing, mutation, statistics and export.
///
/// Methods taking `now` evaluate date buckets against that instant's time zone;
/// the plain variants use the server's local clock.
pub struct LeadAdminService<R> {
    repository: Arc<R>,
}

impl<R> LeadAdminService<R>
where
    R: LeadRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AdminError> {
        self.list_at(filter, &Local::now())
    }

    pub fn list_at<Tz: TimeZone>(
        &self,
        filter: &LeadFilter,
        now: &DateTime<Tz>,
    ) -> Result<Vec<Lead>, AdminError> {
        let leads = self.repository.list()?;
        Ok(filter.apply(leads, now))
    }

    pub fn set_done(&self, id: &LeadId, done: bool) -> Result<Lead, AdminError> {
        let mut lead = self.fetch(id)?;
        if lead.set_done(done, Utc::now()) {
            self.repository.update(&lead)?;
            info!(lead_id = %id, done, "lead completion toggled");
        }
        Ok(lead)
    }

    pub fn update(&self, id: &LeadId, changes: &LeadChanges) -> Result<Lead, AdminError> {
        let mut lead = self.fetch(id)?;
        if changes.is_empty() {
            return Ok(lead);
        }
        changes.apply(&mut lead, Utc::now());
        self.repository.update(&lead)?;
        info!(lead_id = %id, status = %lead.status, "lead details updated");
        Ok(lead)
    }

    pub fn bulk_update_status(
        &self,
        ids: &[LeadId],
        status: LeadStatus,
    ) -> Result<usize, AdminError> {
        let ids = dedupe(ids);
        let updated = self
            .repository
            .update_status_many(&ids, status, Utc::now())?;
        info!(requested = ids.len(), updated, status = %status, "bulk status update");
        Ok(updated)
    }

    pub fn delete(&self, id: &LeadId) -> Result<(), AdminError> {
        if !self.repository.delete(id)? {
            return Err(AdminError::NotFound);
        }
        info!(lead_id = %id, "lead deleted");
        Ok(())
    }

    pub fn delete_many(&self, ids: &[LeadId]) -> Result<usize, AdminError> {
        let ids = dedupe(ids);
        let deleted = self.repository.delete_many(&ids)?;
        info!(requested = ids.len(), deleted, "lead selection deleted");
        Ok(deleted)
    }

    pub fn delete_all(&self) -> Result<usize, AdminError> {
        let deleted = self.repository.delete_all()?;
        info!(deleted, "all leads deleted");
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<LeadStats, AdminError> {
        self.stats_at(&Local::now())
    }

    pub fn stats_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<LeadStats, AdminError> {
        let mut stats = LeadStats::default();
        for lead in self.repository.list()? {
            stats.record_status(lead.status);
            if DateRange::Today.contains(lead.created_at, now) {
                stats.today += 1;
            }
            if DateRange::Last7Days.contains(lead.created_at, now) {
                stats.last_7_days += 1;
            }
        }
        Ok(stats)
    }

    pub fn export(&self, format: ExportFormat, filter: &LeadFilter) -> Result<ExportFile, AdminError> {
        self.export_at(format, filter, &Local::now())
    }

    pub fn export_at<Tz: TimeZone>(
        &self,
        format: ExportFormat,
        filter: &LeadFilter,
        now: &DateTime<Tz>,
    ) -> Result<ExportFile, AdminError> {
        let leads = self.list_at(filter, now)?;
        let bytes = export::render(format, &leads)?;
        let filename = export_filename(filter.status, filter.is_narrowed(), now.date_naive(), format);
        info!(rows = leads.len(), filename = %filename, "leads exported");

        Ok(ExportFile {
            filename,
            content_type: format.content_type(),
            bytes,
            rows: leads.len(),
        })
    }

    fn fetch(&self, id: &LeadId) -> Result<Lead, AdminError> {
        self.repository.fetch(id)?.ok_or(AdminError::NotFound)
    }
}

fn dedupe(ids: &[LeadId]) -> Vec<LeadId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Error raised by the admin service.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Lead not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
