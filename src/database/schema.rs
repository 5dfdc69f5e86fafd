/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for the four record collections
 * and upgrades older stores to the current version. Upgrades are
 * additive only: missing tables and indexes are created, nothing is
 * dropped or rewritten.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        version INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

const CREATE_WORDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY,
        word TEXT NOT NULL,
        meaning TEXT NOT NULL,
        audio_path TEXT NOT NULL DEFAULT '',
        image_path TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_words_category ON words(category);
"#;

const CREATE_ARCHIVED_WORDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS archived_words (
        id INTEGER PRIMARY KEY,
        word TEXT NOT NULL,
        meaning TEXT NOT NULL,
        audio_path TEXT NOT NULL DEFAULT '',
        image_path TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL
    );
"#;

const CREATE_QUIZ_QUESTIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS quiz_questions (
        id INTEGER PRIMARY KEY,
        question TEXT NOT NULL,
        question_english TEXT NOT NULL,
        image TEXT NOT NULL DEFAULT '',
        audio TEXT,
        options TEXT NOT NULL,
        correct_answer TEXT NOT NULL,
        category TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_quiz_questions_category ON quiz_questions(category);
"#;

const CREATE_USER_PROFILE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS user_profile (
        key TEXT PRIMARY KEY,
        nickname TEXT NOT NULL,
        photo TEXT
    );
"#;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else if current_version > SCHEMA_VERSION {
        warn!(
            "Database schema v{} is newer than supported v{}, opening as-is",
            current_version, SCHEMA_VERSION
        );
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(CREATE_SCHEMA_VERSION_TABLE)?;
    create_collections(conn)?;

    info!("Database schema created successfully");
    Ok(())
}

/// Create every collection and index that does not exist yet
fn create_collections(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_WORDS_TABLE)
        .context("Failed to create words collection")?;
    conn.execute_batch(CREATE_ARCHIVED_WORDS_TABLE)
        .context("Failed to create archived-words collection")?;
    conn.execute_batch(CREATE_QUIZ_QUESTIONS_TABLE)
        .context("Failed to create quiz-questions collection")?;
    conn.execute_batch(CREATE_USER_PROFILE_TABLE)
        .context("Failed to create user-profile collection")?;
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < SCHEMA_VERSION {
        match current {
            // v1 stores only knew about words; v2 adds the archive tier,
            // quiz questions, the profile and both category indexes
            1 => {
                create_collections(conn)?;
                current = 2;
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Unknown schema version: {}. Cannot migrate.",
                    current
                ));
            }
        }
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
