//! Core types and traits for CrewSync
//!
//! This crate defines the foundational types used throughout the system:
//! - EntityRef: typed reference to a mutable backend record
//! - VersionedRecord: a record plus its optimistic-concurrency version
//! - OperationLogEntry: one field-level change set in the append-only log
//! - ConflictRecord: a detected group of conflicting concurrent edits
//! - Error: error type hierarchy with transient/fatal classification
//! - EntityStore: the trait seam to the row storage engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod error;
pub mod oplog;
pub mod traits;
pub mod types;

// Re-export commonly used types and traits
pub use conflict::{
    ConflictRecord, ConflictType, ResolutionStrategy, Severity,
};
pub use error::{Error, Result};
pub use oplog::{FieldChange, Operation, OperationLogEntry};
pub use traits::EntityStore;
pub use types::{EntityRef, FieldMap, VersionedRecord};
