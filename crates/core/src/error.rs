//! Error types for the concurrency core
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! ## Transient vs fatal
//!
//! Lock contention and optimistic-version conflicts are expected under load
//! and are safe to retry. Validation failures and missing records are not:
//! retrying them can only fail again. [`Error::is_transient`] encodes that
//! split and is the single classification point consulted by the retry
//! executor.

use crate::types::EntityRef;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for CrewSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message markers that flag a storage error as transient when no structured
/// error code is available from the storage driver.
const TRANSIENT_MARKERS: [&str; 5] = ["timeout", "deadlock", "connection", "unavailable", "busy"];

/// Error types for the concurrency core
#[derive(Debug, Error)]
pub enum Error {
    /// A non-blocking lock acquisition found the lock already held
    #[error("failed to acquire lock '{key}'")]
    LockAcquisition {
        /// The lock key that was contended
        key: String,
    },

    /// A blocking lock acquisition exhausted its waiting budget
    #[error("timed out acquiring lock '{key}' after {waited_ms} ms")]
    LockTimeout {
        /// The lock key that was contended
        key: String,
        /// How long the caller waited before giving up
        waited_ms: u64,
    },

    /// Release or extend was attempted by a holder whose token no longer
    /// matches the stored one (the lock expired and was re-acquired)
    #[error("lock '{key}' is not owned by this holder")]
    LockNotOwned {
        /// The lock key whose token mismatched
        key: String,
    },

    /// An optimistic update lost the race: the stored version moved past
    /// the version the writer read
    #[error("stale write to {entity}: expected version {expected}, found {actual}")]
    StaleObject {
        /// The record that was concurrently modified
        entity: EntityRef,
        /// Version the writer read before modifying
        expected: u64,
        /// Version found in storage at write time
        actual: u64,
    },

    /// Malformed input: bad transform result, bad merge target, or an
    /// attempt to resolve a conflict with an invalid strategy. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist. Never retried.
    #[error("{entity} not found")]
    NotFound {
        /// The missing record
        entity: EntityRef,
    },

    /// The referenced conflict record does not exist. Never retried.
    #[error("conflict record {0} not found")]
    ConflictRecordNotFound(Uuid),

    /// Storage layer error. Transient only when the message carries a known
    /// transient marker (timeout, deadlock, connection, unavailable, busy).
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this failure is expected to succeed on retry
    ///
    /// Lock contention and stale-version conflicts are transient by
    /// definition. Storage errors are classified by message inspection since
    /// the driver boundary exposes no structured code.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::LockAcquisition { .. }
            | Error::LockTimeout { .. }
            | Error::StaleObject { .. } => true,
            Error::Storage(msg) => {
                let msg = msg.to_ascii_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
