/*!
 * Database module for the local structured store.
 *
 * This module provides SQLite-based persistence for:
 * - Active and archived dictionary words
 * - Quiz questions, indexed by category
 * - The singleton user profile
 */

pub mod connection;
pub mod ids;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use ids::IdGenerator;
pub use repository::Repository;
