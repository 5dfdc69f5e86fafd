/*!
 * Error types for the minasbate application.
 *
 * Store-level failures are described by `StoreError`. Repository and
 * synchronizer operations return `anyhow::Result`, and callers that need
 * to react to a specific failure recover it with
 * `err.downcast_ref::<StoreError>()`.
 */

use thiserror::Error;

use crate::database::models::Collection;

/// Failures raised by the persistence core
#[derive(Error, Debug)]
pub enum StoreError {
    /// The schema could not be opened or migrated, or the store was closed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An update targeted an id that does not exist
    #[error("Record {id} not found in {collection}")]
    NotFound {
        /// Collection that was searched
        collection: Collection,
        /// Requested record id
        id: i64,
    },

    /// A backup document is missing required structure
    #[error("Corrupt backup: {0}")]
    CorruptBackup(String),

    /// The seed document could not be fetched
    #[error("Seed fetch failed: {0}")]
    TransientFetchFailure(String),

    /// Clearing stopped after some of the data had already been removed
    #[error("Clear partially failed: {0}")]
    PartialClearFailure(String),

    /// A record failed validation before reaching the store
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// No id is left above the highest id already issued or stored
    #[error("Id space exhausted after {last}")]
    IdsExhausted {
        /// Highest id issued or observed so far
        last: i64,
    },
}

impl StoreError {
    /// Find a `StoreError` anywhere in an `anyhow` error chain
    pub fn find(error: &anyhow::Error) -> Option<&StoreError> {
        error.chain().find_map(|cause| cause.downcast_ref::<StoreError>())
    }
}

/// Main application error type used by the command-line front end
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the persistence core
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error in the configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<StoreError>() {
            Ok(store_error) => Self::Store(store_error),
            Err(other) => Self::Unknown(format!("{:#}", other)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
