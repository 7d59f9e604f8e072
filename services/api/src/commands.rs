use crate::infra::{parse_export_format, parse_range, parse_status, Stores};
use clap::Args;
use leadflow::config::AppConfig;
use leadflow::error::AppError;
use leadflow::forms::{CatalogError, FormCatalog, FormDefinition, FormRepository, UpsertOutcome};
use leadflow::leads::{
    AdminError, DateRange, ExportFormat, LeadAdminService, LeadFilter, LeadRepository, LeadStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Output format: csv or xlsx
    #[arg(long, value_parser = parse_export_format, default_value = "csv")]
    pub(crate) format: ExportFormat,
    /// File to write
    #[arg(long)]
    pub(crate) output: PathBuf,
    /// Date bucket: today, yesterday, last7days, last30days or all
    #[arg(long, value_parser = parse_range)]
    pub(crate) range: Option<DateRange>,
    /// Only leads with this status
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<LeadStatus>,
    /// Case-insensitive text search across contact fields
    #[arg(long)]
    pub(crate) query: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// JSON array of form definitions
    #[arg(long)]
    pub(crate) file: PathBuf,
}

fn load_stores() -> Result<Stores, AppError> {
    let config = AppConfig::load()?;
    Ok(Stores::open(&config.storage))
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let stores = load_stores()?;
    let count = export_leads(stores.leads, &args)?;
    println!(
        "Exported {} lead(s) as {} to {}",
        count,
        args.format.extension(),
        args.output.display()
    );
    Ok(())
}

pub(crate) fn export_leads<R>(repository: Arc<R>, args: &ExportArgs) -> Result<usize, AppError>
where
    R: LeadRepository + 'static,
{
    let filter = LeadFilter {
        range: args.range.unwrap_or_default(),
        query: args
            .query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .map(str::to_lowercase),
        status: args.status,
    };

    let file = LeadAdminService::new(repository)
        .export(args.format, &filter)
        .map_err(admin_error)?;
    std::fs::write(&args.output, &file.bytes)?;
    Ok(file.rows)
}

fn admin_error(err: AdminError) -> AppError {
    match err {
        AdminError::Repository(err) => AppError::Store(err),
        other => AppError::Input(other.to_string()),
    }
}

pub(crate) fn run_forms_list() -> Result<(), AppError> {
    let stores = load_stores()?;
    let catalog = FormCatalog::new(stores.forms);
    let forms = catalog.list().map_err(catalog_error)?;

    if forms.is_empty() {
        println!("No forms defined");
        return Ok(());
    }

    println!("{:<24} {:<8} {:>6}  name", "slug", "state", "fields");
    for form in forms {
        println!(
            "{:<24} {:<8} {:>6}  {}",
            form.slug,
            if form.is_active { "active" } else { "inactive" },
            form.fields.len(),
            form.name
        );
    }
    Ok(())
}

pub(crate) fn run_forms_import(args: ImportArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.file)?;
    let stores = load_stores()?;
    let results = import_forms(stores.forms, &raw)?;

    for (slug, outcome) in &results {
        let verb = match outcome {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        };
        println!("  {verb} {slug}");
    }
    println!("Imported {} form(s) from {}", results.len(), args.file.display());
    Ok(())
}

/// Validate every definition before writing any of them.
pub(crate) fn import_forms<F>(
    repository: Arc<F>,
    raw: &str,
) -> Result<Vec<(String, UpsertOutcome)>, AppError>
where
    F: FormRepository + 'static,
{
    let definitions: Vec<FormDefinition> = serde_json::from_str(raw)
        .map_err(|err| AppError::Input(format!("form import file is not valid: {err}")))?;
    for definition in &definitions {
        definition
            .validate()
            .map_err(|err| AppError::Input(format!("form '{}': {err}", definition.slug)))?;
    }

    let catalog = FormCatalog::new(repository);
    definitions
        .into_iter()
        .map(|definition| {
            let (form, outcome) = catalog.upsert(definition).map_err(catalog_error)?;
            Ok((form.slug, outcome))
        })
        .collect()
}

fn catalog_error(err: CatalogError) -> AppError {
    match err {
        CatalogError::Repository(err) => AppError::Store(err),
        other => AppError::Input(other.to_string()),
    }
}
