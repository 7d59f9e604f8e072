//! Lead capture and administration.
//!
//! Public intake validates and stores submissions, then hands them to the
//! notifier. The admin side lists, filters, mutates, summarizes and exports
//! stored leads behind the shared admin key.

pub mod admin;
pub mod domain;
pub mod export;
pub mod filter;
pub mod intake;
pub mod repository;
pub mod router;
pub mod sqlite;
pub mod validation;

#[cfg(test)]
mod tests;

pub use admin::{AdminError, LeadAdminService};
pub use domain::{
    Lead, LeadChanges, LeadId, LeadStats, LeadStatus, LeadView, NewLead, DEFAULT_SOURCE,
};
pub use export::{ExportError, ExportFile, ExportFormat};
pub use filter::{DateRange, LeadFilter, LeadQuery};
pub use intake::{IntakeError, LeadIntakeService};
pub use repository::{LeadRepository, RepositoryError};
pub use router::{lead_router, LeadRouterState};
pub use sqlite::{lead_migrations, SqliteLeadRepository};
pub use validation::{LeadSubmission, LeadValidationError};
