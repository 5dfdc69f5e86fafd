/*!
 * # Minasbate - local-first vocabulary and quiz store
 *
 * The persistence core of a single-user language-learning application.
 *
 * ## Features
 *
 * - Dictionary words with an archive tier, moved atomically between tiers
 * - Multiple-choice quiz questions grouped by category
 * - A singleton user profile
 * - Activity progress kept in a key-value sidecar
 * - One-time seeding from an external word list
 * - Versioned JSON backups with all-or-nothing restore
 * - An in-memory mirror kept in step with every mutation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `database`: SQLite store
 *   - `database::schema`: Collections, indexes and migrations
 *   - `database::connection`: Connection lifecycle and async access
 *   - `database::repository`: CRUD, bulk and cross-collection operations
 *   - `database::models`: Record types
 * - `sidecar`: Progress and first-run flag
 * - `seed`: First-run seed loader
 * - `records`: Record-by-record decoding of untrusted JSON
 * - `backup`: Backup document format
 * - `activities`: Activity catalogue and progress rules
 * - `synchronizer`: In-memory mirror of the store
 * - `app_config`: Configuration management
 * - `app_controller`: Wiring used by the command-line front end
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod activities;
pub mod app_config;
pub mod app_controller;
pub mod backup;
pub mod database;
pub mod errors;
pub mod records;
pub mod seed;
pub mod sidecar;
pub mod synchronizer;

// Re-export main types for easier usage
pub use activities::{Activity, ActivityKind, Progress};
pub use app_config::Config;
pub use app_controller::Controller;
pub use backup::BackupDocument;
pub use database::models::{
    Category, Collection, QuizQuestion, QuizQuestionInput, UserProfile, Word, WordInput,
};
pub use database::{DatabaseConnection, Repository};
pub use errors::{AppError, StoreError};
pub use seed::{Bootstrapper, FileSeedSource, HttpSeedSource, SeedSource};
pub use sidecar::Sidecar;
pub use synchronizer::{AppState, SearchResults, Synchronizer};
