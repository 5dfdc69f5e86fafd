/*!
 * Database connection management.
 *
 * This module opens the SQLite store, runs schema initialization, and
 * provides async-safe access using tokio's spawn_blocking. A connection
 * can be closed explicitly; every later operation then fails fast with
 * `StoreError::StoreUnavailable` instead of touching a dead handle.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;
use crate::errors::StoreError;

/// Default database filename
pub const DEFAULT_DB_FILENAME: &str = "minasbate-app.db";

/// Default data directory name under the user's data directory
pub const DEFAULT_DATA_DIRNAME: &str = "minasbate";

const MEMORY_PATH: &str = ":memory:";

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct DatabaseConnection {
    /// Path to the database file
    db_path: PathBuf,
    /// Shared handle, `None` once the store has been closed
    connection: Arc<Mutex<Option<Connection>>>,
}

impl DatabaseConnection {
    /// Open the store at the default location
    pub fn new_default() -> Result<Self> {
        let db_path = Self::default_data_dir()?.join(DEFAULT_DB_FILENAME);
        Self::new(&db_path)
    }

    /// Open the store at the specified path, creating or upgrading the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::StoreUnavailable(format!(
                        "cannot create database directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path).map_err(|e| {
            StoreError::StoreUnavailable(format!("cannot open {:?}: {}", db_path, e))
        })?;

        Self::initialize(conn, db_path)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::StoreUnavailable(format!("cannot open memory store: {}", e)))?;

        Self::initialize(conn, PathBuf::from(MEMORY_PATH))
    }

    fn initialize(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn).map_err(|e| {
            StoreError::StoreUnavailable(format!("schema upgrade failed: {:#}", e))
        })?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        Ok(base_dir.join(DEFAULT_DATA_DIRNAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether `close` has been called on this connection or a clone of it
    pub fn is_closed(&self) -> bool {
        match self.connection.lock() {
            Ok(guard) => guard.is_none(),
            Err(_) => true,
        }
    }

    /// Close the underlying handle. Later operations fail with `StoreUnavailable`.
    pub fn close(&self) -> Result<()> {
        let mut guard = lock(&self.connection)?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| StoreError::StoreUnavailable(format!("close failed: {}", e)))?;
            info!("Closed database at: {:?}", self.db_path);
        }
        Ok(())
    }

    /// Execute a database operation with the connection
    ///
    /// This method acquires the mutex lock and executes the provided closure
    /// with access to the connection. For async contexts, use `execute_async`.
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = lock(&self.connection)?;
        f(open_handle(&guard)?)
    }

    /// Begin a transaction and execute operations within it
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        let mut guard = lock(&self.connection)?;
        run_transaction(&mut guard, f)
    }

    /// Execute a database operation asynchronously using spawn_blocking
    ///
    /// This is the preferred method for async contexts as it prevents
    /// blocking the async runtime.
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(open_handle(&guard)?)
        })
        .await
        .context("Database task panicked")?
    }

    /// Begin an async transaction and execute operations within it
    ///
    /// The closure's writes become visible together on success. Any error
    /// drops the transaction, which rolls every write back.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            run_transaction(&mut guard, f)
        })
        .await
        .context("Database transaction task panicked")?
    }

    /// Get record counts and file size
    pub fn stats(&self) -> Result<DatabaseStats> {
        let db_path = self.db_path.clone();
        self.execute(move |conn| {
            let count = |table: &str| -> Result<i64> {
                let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
                Ok(n)
            };

            let file_size = if db_path.to_string_lossy() != MEMORY_PATH {
                std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0)
            } else {
                0
            };

            Ok(DatabaseStats {
                word_count: count("words")?,
                archived_word_count: count("archived_words")?,
                quiz_question_count: count("quiz_questions")?,
                has_profile: count("user_profile")? > 0,
                file_size_bytes: file_size,
            })
        })
    }
}

type SharedConnection = Arc<Mutex<Option<Connection>>>;

fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Option<Connection>>> {
    conn.lock().map_err(|e| {
        StoreError::StoreUnavailable(format!("failed to acquire database lock: {}", e)).into()
    })
}

fn open_handle<'a>(guard: &'a MutexGuard<'_, Option<Connection>>) -> Result<&'a Connection> {
    guard
        .as_ref()
        .ok_or_else(|| StoreError::StoreUnavailable("store is closed".to_string()).into())
}

fn run_transaction<F, T>(guard: &mut MutexGuard<'_, Option<Connection>>, f: F) -> Result<T>
where
    F: FnOnce(&rusqlite::Transaction) -> Result<T>,
{
    let conn = guard
        .as_mut()
        .ok_or_else(|| StoreError::StoreUnavailable("store is closed".to_string()))?;

    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;

    Ok(result)
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Number of active words
    pub word_count: i64,
    /// Number of archived words
    pub archived_word_count: i64,
    /// Number of quiz questions across all categories
    pub quiz_question_count: i64,
    /// Whether a profile has been saved
    pub has_profile: bool,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Words: {}, Archived: {}, Quiz questions: {}, Profile: {}, Size: {} KB",
            self.word_count,
            self.archived_word_count,
            self.quiz_question_count,
            if self.has_profile { "saved" } else { "none" },
            self.file_size_bytes / 1024
        )
    }
}
