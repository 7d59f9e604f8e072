use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::domain::{FormField, FormSchema};
use super::repository::{FormRepository, RepositoryError};
use crate::storage::Database;

pub const FORMS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS form_types (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        fields TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
";

const FORM_COLUMNS: &str = "id, name, slug, description, fields, is_active, created_at, updated_at";

pub fn form_migrations() -> Vec<&'static str> {
    vec![FORMS_SCHEMA]
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<FormSchema> {
    let id: String = row.get(0)?;
    let fields: String = row.get(4)?;
    Ok(FormSchema {
        id: Uuid::parse_str(&id).map_err(|err| conversion_error(0, err))?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        fields: serde_json::from_str::<Vec<FormField>>(&fields)
            .map_err(|err| conversion_error(4, err))?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn encode_fields(fields: &[FormField]) -> Result<String, RepositoryError> {
    serde_json::to_string(fields).map_err(|err| RepositoryError::Unavailable(err.to_string()))
}

/// Form catalog persisted in its own SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteFormRepository {
    db: Arc<Database>,
}

impl SqliteFormRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(Database::in_memory(form_migrations())))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl FormRepository for SqliteFormRepository {
    fn insert(&self, form: FormSchema) -> Result<FormSchema, RepositoryError> {
        let fields = encode_fields(&form.fields)?;
        let conn = self.db.connection()?.lock();
        conn.execute(
            &format!("INSERT INTO form_types ({FORM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                form.id.to_string(),
                form.name,
                form.slug,
                form.description,
                fields,
                form.is_active,
                form.created_at,
                form.updated_at,
            ],
        )?;
        Ok(form)
    }

    fn fetch_by_slug(&self, slug: &str) -> Result<Option<FormSchema>, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let form = conn
            .query_row(
                &format!("SELECT {FORM_COLUMNS} FROM form_types WHERE slug = ?1"),
                params![slug],
                form_from_row,
            )
            .optional()?;
        Ok(form)
    }

    fn list(&self) -> Result<Vec<FormSchema>, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FORM_COLUMNS} FROM form_types ORDER BY name COLLATE NOCASE, slug"
        ))?;
        let forms = stmt
            .query_map([], form_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(forms)
    }

    fn update(&self, form: &FormSchema) -> Result<(), RepositoryError> {
        let fields = encode_fields(&form.fields)?;
        let conn = self.db.connection()?.lock();
        let changed = conn.execute(
            "UPDATE form_types SET name = ?1, description = ?2, fields = ?3, updated_at = ?4 \
             WHERE slug = ?5",
            params![form.name, form.description, fields, form.updated_at, form.slug],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn set_active(
        &self,
        slug: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let changed = conn.execute(
            "UPDATE form_types SET is_active = ?1, updated_at = ?2 WHERE slug = ?3",
            params![active, at, slug],
        )?;
        Ok(changed > 0)
    }
}
