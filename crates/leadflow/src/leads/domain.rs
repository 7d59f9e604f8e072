use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag applied when a submission does not carry one.
pub const DEFAULT_SOURCE: &str = "landing";

/// Store-assigned lead identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub Uuid);

impl LeadId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Pipeline position of a lead. `Done` doubles as the completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Done,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 4] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Done => "done",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Qualified => "Qualified",
            LeadStatus::Done => "Done",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown lead status '{s}'"))
    }
}

/// Persisted lead record.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub loan_amount: Option<f64>,
    pub status: LeadStatus,
    pub source: String,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_done(&self) -> bool {
        self.status == LeadStatus::Done
    }

    /// Apply the completion toggle. Returns `false` when nothing changed.
    pub fn set_done(&mut self, done: bool, at: DateTime<Utc>) -> bool {
        let next = match (done, self.status) {
            (true, LeadStatus::Done) => return false,
            (true, _) => LeadStatus::Done,
            (false, LeadStatus::Done) => LeadStatus::New,
            (false, _) => return false,
        };
        self.status = next;
        self.updated_at = at;
        true
    }

    pub fn view(&self) -> LeadView {
        LeadView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            city: self.city.clone(),
            loan_amount: self.loan_amount,
            done: self.is_done(),
            status: self.status,
            source: self.source.clone(),
            assigned_to: self.assigned_to.clone(),
            notes: self.notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Normalized submission ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub loan_amount: Option<f64>,
    pub source: String,
}

impl NewLead {
    pub fn into_lead(self, id: LeadId, now: DateTime<Utc>) -> Lead {
        Lead {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            city: self.city,
            loan_amount: self.loan_amount,
            status: LeadStatus::New,
            source: self.source,
            assigned_to: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Wire representation shared by the admin list and mutation responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    #[serde(rename = "loanAmount")]
    pub loan_amount: Option<f64>,
    pub done: bool,
    pub status: LeadStatus,
    pub source: String,
    #[serde(rename = "assignedTo")]
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial detail update. The outer `Option` marks presence; an inner `None`
/// clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadChanges {
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl LeadChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.assigned_to.is_none() && self.notes.is_none()
    }

    pub fn apply(&self, lead: &mut Lead, at: DateTime<Utc>) {
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(assigned_to) = &self.assigned_to {
            lead.assigned_to = assigned_to.clone();
        }
        if let Some(notes) = &self.notes {
            lead.notes = notes.clone();
        }
        lead.updated_at = at;
    }
}

/// Per-status totals reported on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: usize,
    pub new: usize,
    pub contacted: usize,
    pub qualified: usize,
    pub done: usize,
    pub today: usize,
    #[serde(rename = "last7days")]
    pub last_7_days: usize,
}

impl LeadStats {
    pub(crate) fn record_status(&mut self, status: LeadStatus) {
        self.total += 1;
        match status {
            LeadStatus::New => self.new += 1,
            LeadStatus::Contacted => self.contacted += 1,
            LeadStatus::Qualified => self.qualified += 1,
            LeadStatus::Done => self.done += 1,
        }
    }
}
