//! SQLite plumbing shared by the lead, form and push-subscription stores.
//!
//! A [`Database`] is constructed once at startup and injected into every
//! repository that needs it. The underlying connection is opened on first use
//! and cached for the lifetime of the handle.

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode};
use tracing::info;

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => write!(f, ":memory:"),
        }
    }
}

/// Lazily connected SQLite handle with its schema migrations.
pub struct Database {
    location: DatabaseLocation,
    migrations: Vec<&'static str>,
    connection: OnceCell<Mutex<Connection>>,
}

impl Database {
    pub fn new(location: DatabaseLocation, migrations: Vec<&'static str>) -> Self {
        Self {
            location,
            migrations,
            connection: OnceCell::new(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, migrations: Vec<&'static str>) -> Self {
        Self::new(DatabaseLocation::File(path.into()), migrations)
    }

    pub fn in_memory(migrations: Vec<&'static str>) -> Self {
        Self::new(DatabaseLocation::Memory, migrations)
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn is_connected(&self) -> bool {
        self.connection.get().is_some()
    }

    /// Return the cached connection, opening it and applying migrations on first use.
    pub fn connection(&self) -> Result<&Mutex<Connection>, RepositoryError> {
        self.connection
            .get_or_try_init(|| {
                let conn = match &self.location {
                    DatabaseLocation::File(path) => Connection::open(path),
                    DatabaseLocation::Memory => Connection::open_in_memory(),
                }
                .map_err(|err| {
                    RepositoryError::Unavailable(format!(
                        "failed to open database {}: {err}",
                        self.location
                    ))
                })?;

                for migration in &self.migrations {
                    conn.execute_batch(migration).map_err(|err| {
                        RepositoryError::Unavailable(format!(
                            "failed to migrate database {}: {err}",
                            self.location
                        ))
                    })?;
                }

                info!(database = %self.location, "database connected");
                Ok(Mutex::new(conn))
            })
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::Conflict
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

/// Run synchronous store work on tokio's blocking pool so the connection
/// mutex is never held on a runtime worker.
pub async fn run_blocking<T, E, F>(work: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<RepositoryError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => Err(RepositoryError::Unavailable(format!("store task failed: {err}")).into()),
    }
}
