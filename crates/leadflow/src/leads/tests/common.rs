use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::auth::AdminGuard;
use crate::leads::domain::{Lead, LeadId, LeadStatus};
use crate::leads::repository::{LeadRepository, RepositoryError};
use crate::leads::validation::LeadSubmission;
use crate::leads::{lead_router, LeadAdminService, LeadIntakeService, LeadRouterState};
use crate::notify::{LeadNotifier, LeadSummary};

pub(super) const ADMIN_KEY: &str = "test-admin-key";

pub(super) fn reference_submission() -> LeadSubmission {
    LeadSubmission::from_value(json!({
        "name": "  Asha Rao ",
        "email": "ASHA@Example.com",
        "phone": "+91 98765 43210",
        "city": "Pune",
        "loanAmount": "500000",
    }))
}

pub(super) fn lead_at(name: &str, email: &str, created_at: DateTime<Utc>) -> Lead {
    Lead {
        id: LeadId::generate(),
        name: name.to_string(),
        email: email.to_string(),
        phone: "9876543210".to_string(),
        city: "Mumbai".to_string(),
        loan_amount: Some(250000.0),
        status: LeadStatus::New,
        source: "landing".to_string(),
        assigned_to: None,
        notes: None,
        created_at,
        updated_at: created_at,
    }
}

pub(super) fn june(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
}

/// Vec-backed repository honouring the unique email rule.
#[derive(Default, Clone)]
pub(super) struct MemoryLeadRepository {
    pub(super) leads: Arc<Mutex<Vec<Lead>>>,
}

impl MemoryLeadRepository {
    pub(super) fn seeded(leads: Vec<Lead>) -> Self {
        Self {
            leads: Arc::new(Mutex::new(leads)),
        }
    }

    pub(super) fn snapshot(&self) -> Vec<Lead> {
        self.leads.lock().expect("repository mutex poisoned").clone()
    }
}

impl LeadRepository for MemoryLeadRepository {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        if guard
            .iter()
            .any(|existing| existing.id == lead.id || existing.email == lead.email)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(lead.clone());
        Ok(lead)
    }

    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let mut leads = self.snapshot();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.snapshot().into_iter().find(|lead| lead.id == *id))
    }

    fn update(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id == lead.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = lead.clone();
        Ok(())
    }

    fn update_status_many(
        &self,
        ids: &[LeadId],
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let mut updated = 0;
        for lead in guard.iter_mut().filter(|lead| ids.contains(&lead.id)) {
            lead.status = status;
            lead.updated_at = at;
            updated += 1;
        }
        Ok(updated)
    }

    fn delete(&self, id: &LeadId) -> Result<bool, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|lead| lead.id != *id);
        Ok(guard.len() < before)
    }

    fn delete_many(&self, ids: &[LeadId]) -> Result<usize, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|lead| !ids.contains(&lead.id));
        Ok(before - guard.len())
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        let mut guard = self.leads.lock().expect("repository mutex poisoned");
        let deleted = guard.len();
        guard.clear();
        Ok(deleted)
    }
}

pub(super) struct ConflictRepository;

impl LeadRepository for ConflictRepository {
    fn insert(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        Ok(Vec::new())
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(None)
    }

    fn update(&self, _lead: &Lead) -> Result<(), RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn update_status_many(
        &self,
        _ids: &[LeadId],
        _status: LeadStatus,
        _at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Ok(0)
    }

    fn delete(&self, _id: &LeadId) -> Result<bool, RepositoryError> {
        Ok(false)
    }

    fn delete_many(&self, _ids: &[LeadId]) -> Result<usize, RepositoryError> {
        Ok(0)
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        Ok(0)
    }
}

pub(super) struct UnavailableRepository;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl LeadRepository for UnavailableRepository {
    fn insert(&self, _lead: Lead) -> Result<Lead, RepositoryError> {
        Err(offline())
    }

    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        Err(offline())
    }

    fn fetch(&self, _id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Err(offline())
    }

    fn update(&self, _lead: &Lead) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn update_status_many(
        &self,
        _ids: &[LeadId],
        _status: LeadStatus,
        _at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Err(offline())
    }

    fn delete(&self, _id: &LeadId) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    fn delete_many(&self, _ids: &[LeadId]) -> Result<usize, RepositoryError> {
        Err(offline())
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        Err(offline())
    }
}

/// Memory store that remembers which threads touched it.
#[derive(Default)]
pub(super) struct ThreadTrackingRepository {
    pub(super) inner: MemoryLeadRepository,
    pub(super) threads: Mutex<Vec<ThreadId>>,
}

impl ThreadTrackingRepository {
    fn track(&self) {
        self.threads
            .lock()
            .expect("thread log poisoned")
            .push(std::thread::current().id());
    }
}

impl LeadRepository for ThreadTrackingRepository {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.track();
        self.inner.insert(lead)
    }

    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        self.track();
        self.inner.list()
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.track();
        self.inner.fetch(id)
    }

    fn update(&self, lead: &Lead) -> Result<(), RepositoryError> {
        self.track();
        self.inner.update(lead)
    }

    fn update_status_many(
        &self,
        ids: &[LeadId],
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.track();
        self.inner.update_status_many(ids, status, at)
    }

    fn delete(&self, id: &LeadId) -> Result<bool, RepositoryError> {
        self.track();
        self.inner.delete(id)
    }

    fn delete_many(&self, ids: &[LeadId]) -> Result<usize, RepositoryError> {
        self.track();
        self.inner.delete_many(ids)
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        self.track();
        self.inner.delete_all()
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    events: Arc<Mutex<Vec<LeadSummary>>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<LeadSummary> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl LeadNotifier for RecordingNotifier {
    fn lead_captured(&self, lead: LeadSummary) {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(lead);
    }
}

pub(super) fn router_state<R: LeadRepository + 'static>(
    repository: Arc<R>,
    notifier: Arc<RecordingNotifier>,
) -> LeadRouterState<R, RecordingNotifier> {
    LeadRouterState {
        intake: Arc::new(LeadIntakeService::new(repository.clone(), notifier)),
        admin: Arc::new(LeadAdminService::new(repository)),
        guard: AdminGuard::new(Some(ADMIN_KEY)),
    }
}

pub(super) fn build_router(
    repository: Arc<MemoryLeadRepository>,
) -> (axum::Router, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let router = lead_router(router_state(repository, notifier.clone()));
    (router, notifier)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
