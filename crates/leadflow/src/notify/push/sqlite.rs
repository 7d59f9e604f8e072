use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use super::{PushSubscriptionRecord, PushSubscriptionRepository, RepositoryError};
use crate::storage::Database;

pub const SUBSCRIPTIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS push_subscriptions (
        id TEXT PRIMARY KEY,
        endpoint TEXT NOT NULL UNIQUE,
        subscription TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
";

const SUBSCRIPTION_COLUMNS: &str = "id, endpoint, subscription, active, created_at";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PushSubscriptionRecord> {
    let raw: String = row.get(2)?;
    let subscription = serde_json::from_str::<Value>(&raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    Ok(PushSubscriptionRecord {
        id: row.get(0)?,
        endpoint: row.get(1)?,
        subscription,
        active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Subscriptions stored alongside the leads.
#[derive(Debug, Clone)]
pub struct SqlitePushSubscriptionRepository {
    db: Arc<Database>,
}

impl SqlitePushSubscriptionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl PushSubscriptionRepository for SqlitePushSubscriptionRepository {
    fn upsert(
        &self,
        endpoint: &str,
        subscription: &Value,
    ) -> Result<PushSubscriptionRecord, RepositoryError> {
        let conn = self.db.connection()?.lock();
        conn.execute(
            "INSERT INTO push_subscriptions (id, endpoint, subscription, active, created_at) \
             VALUES (?1, ?2, ?3, 1, ?4) \
             ON CONFLICT(endpoint) DO UPDATE SET active = 1",
            params![
                uuid::Uuid::new_v4().to_string(),
                endpoint,
                subscription.to_string(),
                Utc::now(),
            ],
        )?;

        conn.query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions WHERE endpoint = ?1"),
            params![endpoint],
            record_from_row,
        )
        .optional()?
        .ok_or(RepositoryError::NotFound)
    }

    fn list_active(&self) -> Result<Vec<PushSubscriptionRecord>, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM push_subscriptions \
             WHERE active = 1 ORDER BY created_at, rowid"
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn deactivate(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let changed = conn.execute(
            "UPDATE push_subscriptions SET active = 0 WHERE id = ?1 AND active = 1",
            params![id],
        )?;
        Ok(changed > 0)
    }

    fn deactivate_endpoint(&self, endpoint: &str) -> Result<usize, RepositoryError> {
        let conn = self.db.connection()?.lock();
        let changed = conn.execute(
            "UPDATE push_subscriptions SET active = 0 WHERE endpoint = ?1 AND active = 1",
            params![endpoint],
        )?;
        Ok(changed)
    }
}
