//! Shared SQLite connection used by the slim middle and the table writer.
//!
//! Both halves write through one connection so a run is a single
//! transaction and neither side blocks on the other's write lock.

use std::sync::{Arc, Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

/// Errors raised while opening or driving the shared connection.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory for {path:?}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Applying connection pragmas failed.
    #[error("failed to configure SQLite connection")]
    Configure {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Beginning a transaction failed.
    #[error("failed to begin transaction")]
    Begin {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Committing a transaction failed.
    #[error("failed to commit transaction")]
    Commit {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Another thread panicked while holding the connection.
    #[error("SQLite connection lock poisoned")]
    Poisoned,
}

/// Cloneable handle to a SQLite database.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at `path`, creating missing parent
    /// directories.
    pub fn open(path: &Utf8Path) -> Result<Self, DatabaseError> {
        osm2sql_fs::ensure_parent_dir(path).map_err(|source| DatabaseError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| DatabaseError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::configure(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let connection = Connection::open_in_memory().map_err(|source| DatabaseError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::configure(connection)
    }

    fn configure(connection: Connection) -> Result<Self, DatabaseError> {
        // Bulk loads are rebuilt from the input after a crash anyway.
        connection
            .pragma_update(None, "synchronous", "OFF")
            .map_err(|source| DatabaseError::Configure { source })?;
        connection
            .pragma_update_and_check(None, "journal_mode", "MEMORY", |row| {
                row.get::<_, String>(0)
            })
            .map_err(|source| DatabaseError::Configure { source })?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Lock the connection for exclusive use.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.connection.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Lock the connection with a transaction open, starting one if needed.
    pub fn writer(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        let connection = self.lock()?;
        if connection.is_autocommit() {
            connection
                .execute_batch("BEGIN")
                .map_err(|source| DatabaseError::Begin { source })?;
        }
        Ok(connection)
    }

    /// Commit the open transaction, if any.
    pub fn commit(&self) -> Result<(), DatabaseError> {
        let connection = self.lock()?;
        if !connection.is_autocommit() {
            connection
                .execute_batch("COMMIT")
                .map_err(|source| DatabaseError::Commit { source })?;
        }
        Ok(())
    }
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Placeholder list `?,?,...` for an `IN` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// Largest `IN` list sent in one statement, below SQLite's default
/// variable limit.
pub(crate) const IN_CHUNK: usize = 900;
