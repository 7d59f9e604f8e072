use super::common::*;
use crate::forms::domain::{FieldKind, FormUpdate, FormValidationError};
use crate::forms::{CatalogError, UpsertOutcome};

#[test]
fn resolve_returns_active_forms_unchanged() {
    let (catalog, _) = catalog();
    let created = catalog
        .create(loan_definition("business-loan", true))
        .expect("create succeeds");

    let resolved = catalog.resolve("business-loan").expect("active form resolves");
    assert_eq!(resolved, created);
    let kinds: Vec<FieldKind> = resolved.fields.iter().map(|field| field.kind).collect();
    assert_eq!(
        kinds,
        vec![FieldKind::Text, FieldKind::Tel, FieldKind::Number, FieldKind::Select]
    );
    assert!(resolved.fields[0].required);
    assert!(!resolved.fields[2].required);
}

#[test]
fn inactive_forms_are_not_found() {
    let (catalog, _) = catalog();
    catalog
        .create(loan_definition("loan", false))
        .expect("create succeeds");

    assert!(matches!(catalog.resolve("loan"), Err(CatalogError::NotFound)));
    assert!(matches!(catalog.resolve("missing"), Err(CatalogError::NotFound)));
    assert_eq!(catalog.list().expect("list").len(), 1);
}

#[test]
fn create_rejects_duplicates_and_invalid_schemas() {
    let (catalog, _) = catalog();
    catalog
        .create(loan_definition("loan", true))
        .expect("create succeeds");

    match catalog.create(loan_definition("loan", true)) {
        Err(CatalogError::Conflict(slug)) => assert_eq!(slug, "loan"),
        other => panic!("expected conflict, got {other:?}"),
    }

    let mut invalid = loan_definition("other-loan", true);
    invalid.fields[3].options = None;
    match catalog.create(invalid) {
        Err(CatalogError::Invalid(FormValidationError::MissingOptions(name))) => {
            assert_eq!(name, "sector")
        }
        other => panic!("expected invalid schema, got {other:?}"),
    }
}

#[test]
fn update_keeps_slug_and_reorders_fields() {
    let (catalog, _) = catalog();
    let created = catalog
        .create(loan_definition("loan", true))
        .expect("create succeeds");

    let mut fields = created.fields.clone();
    fields.reverse();
    let updated = catalog
        .update(
            "loan",
            FormUpdate {
                name: "Business Loan 2025".to_string(),
                description: String::new(),
                fields,
            },
        )
        .expect("update succeeds");

    assert_eq!(updated.slug, "loan");
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.fields[0].name, "sector");
    assert_eq!(catalog.resolve("loan").expect("resolves"), updated);

    assert!(matches!(
        catalog.update(
            "ghost",
            FormUpdate {
                name: "Ghost".to_string(),
                description: String::new(),
                fields: created.fields,
            },
        ),
        Err(CatalogError::NotFound)
    ));
}

#[test]
fn deactivation_retires_without_deleting() {
    let (catalog, _) = catalog();
    catalog
        .create(loan_definition("loan", true))
        .expect("create succeeds");

    let retired = catalog.set_active("loan", false).expect("deactivate");
    assert!(!retired.is_active);
    assert!(matches!(catalog.resolve("loan"), Err(CatalogError::NotFound)));

    catalog.set_active("loan", true).expect("reactivate");
    assert!(catalog.resolve("loan").is_ok());
    assert!(matches!(
        catalog.set_active("ghost", true),
        Err(CatalogError::NotFound)
    ));
}

#[test]
fn upsert_creates_then_overwrites_by_slug() {
    let (catalog, _) = catalog();
    let (first, outcome) = catalog
        .upsert(loan_definition("loan", true))
        .expect("upsert creates");
    assert_eq!(outcome, UpsertOutcome::Created);

    let mut changed = loan_definition("loan", false);
    changed.name = "Renamed Loan".to_string();
    let (second, outcome) = catalog.upsert(changed).expect("upsert updates");
    assert_eq!(outcome, UpsertOutcome::Updated);
    assert_eq!(second.id, first.id);
    assert_eq!(second.name, "Renamed Loan");
    assert!(!second.is_active);
    assert_eq!(catalog.list().expect("list").len(), 1);
}
