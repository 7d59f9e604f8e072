use leadflow::config::StorageConfig;
use leadflow::forms::{form_migrations, SqliteFormRepository};
use leadflow::leads::{lead_migrations, DateRange, ExportFormat, LeadStatus, SqliteLeadRepository};
use leadflow::notify::push::SqlitePushSubscriptionRepository;
use leadflow::storage::Database;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Repositories over the leads database (leads plus push subscriptions) and
/// the forms database. Connections open on first use.
#[derive(Clone)]
pub(crate) struct Stores {
    pub(crate) leads: Arc<SqliteLeadRepository>,
    pub(crate) subscriptions: Arc<SqlitePushSubscriptionRepository>,
    pub(crate) forms: Arc<SqliteFormRepository>,
}

impl Stores {
    pub(crate) fn open(config: &StorageConfig) -> Self {
        let leads_db = Arc::new(Database::file(
            &config.leads_db,
            lead_migrations(config.unique_email),
        ));
        let forms_db = Arc::new(Database::file(&config.forms_db, form_migrations()));
        Self::from_databases(leads_db, forms_db)
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self::from_databases(
            Arc::new(Database::in_memory(lead_migrations(true))),
            Arc::new(Database::in_memory(form_migrations())),
        )
    }

    fn from_databases(leads_db: Arc<Database>, forms_db: Arc<Database>) -> Self {
        Self {
            leads: Arc::new(SqliteLeadRepository::new(leads_db.clone())),
            subscriptions: Arc::new(SqlitePushSubscriptionRepository::new(leads_db)),
            forms: Arc::new(SqliteFormRepository::new(forms_db)),
        }
    }
}

pub(crate) fn parse_export_format(raw: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(raw).ok_or_else(|| format!("unsupported export format '{raw}' (csv, xlsx)"))
}

pub(crate) fn parse_range(raw: &str) -> Result<DateRange, String> {
    DateRange::parse(raw).ok_or_else(|| {
        format!("unknown range '{raw}' (today, yesterday, last7days, last30days, all)")
    })
}

pub(crate) fn parse_status(raw: &str) -> Result<LeadStatus, String> {
    LeadStatus::parse(raw)
        .ok_or_else(|| format!("unknown status '{raw}' (new, contacted, qualified, done)"))
}
