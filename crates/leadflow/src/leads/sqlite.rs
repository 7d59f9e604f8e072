use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row, ToSql};

use super::domain::{Lead, LeadId, LeadStatus};
use super::repository::{LeadRepository, RepositoryError};
use crate::storage::Database;

pub const LEADS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS leads (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        city TEXT NOT NULL DEFAULT '',
        loan_amount REAL,
        status TEXT NOT NULL DEFAULT 'new',
        source TEXT NOT NULL DEFAULT 'landing',
        assigned_to TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS leads_created_at ON leads (created_at);
";

pub const UNIQUE_EMAIL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS leads_email_unique ON leads (email);";

const LEAD_COLUMNS: &str = "id, name, email, phone, city, loan_amount, status, source, \
                            assigned_to, notes, created_at, updated_at";

/// Migrations for the lead database. Push subscriptions share the same file.
pub fn lead_migrations(unique_email: bool) -> Vec<&'static str> {
    let mut migrations = vec![LEADS_SCHEMA, crate::notify::push::SUBSCRIPTIONS_SCHEMA];
    if unique_email {
        migrations.push(UNIQUE_EMAIL_INDEX);
    }
    migrations
}

impl ToSql for LeadStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LeadStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        LeadStatus::parse(raw).ok_or_else(|| FromSqlError::Other(format!("unknown status '{raw}'").into()))
    }
}

impl ToSql for LeadId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for LeadId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        LeadId::parse(raw).ok_or_else(|| FromSqlError::Other(format!("invalid lead id '{raw}'").into()))
    }
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        city: row.get(4)?,
        loan_amount: row.get(5)?,
        status: row.get(6)?,
        source: row.get(7)?,
        assigned_to: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// SQLite-backed [`LeadRepository`].
#[derive(Debug, Clone)]
pub struct SqliteLeadRepository {
    db: Arc<Database>,
}

impl SqliteLeadRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn in_memory(unique_email: bool) -> Self {
        Self::new(Arc::new(Database::in_memory(lead_migrations(unique_email))))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl LeadRepository for SqliteLeadRepository {
    fn insert(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let conn = self.db.connection()?.lock();
        conn.execute(
            &format!(
                "INSERT INTO leads ({LEAD_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                lead.id,
                lead.name,
                lead.email,
                lead.phone,
                lead.city,
                lead.loan_amount,
                lead.status,
                lead.source,
                lead.assigned_to,
                lead.notes,
                lead.created_at,
                lead.updated_at,
            ],
        )?;
        Ok(lead)
    }

    fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC, rowid DESC"
        ))?;
        let leads = stmt
            .query_map([], lead_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leads)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let lead = conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                params![id],
                lead_from_row,
            )
            .optional()?;
        Ok(lead)
    }

    fn update(&self, lead: &Lead) -> Result<(), RepositoryError> {
        let conn = self.db.connection()?.lock();
        let changed = conn.execute(
            "UPDATE leads SET status = ?2, assigned_to = ?3, notes = ?4, updated_at = ?5 \
             WHERE id = ?1",
            params![lead.id, lead.status, lead.assigned_to, lead.notes, lead.updated_at],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn update_status_many(
        &self,
        ids: &[LeadId],
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.db.connection()?.lock();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt =
                tx.prepare("UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1")?;
            for id in ids {
                updated += stmt.execute(params![id, status, at])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, id: &LeadId) -> Result<bool, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let removed = conn.execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn delete_many(&self, ids: &[LeadId]) -> Result<usize, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.db.connection()?.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM leads WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn delete_all(&self) -> Result<usize, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let removed = conn.execute("DELETE FROM leads", [])?;
        Ok(removed)
    }
}
