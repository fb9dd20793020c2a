//! In-memory entity storage for CrewSync
//!
//! [`MemoryEntityStore`] implements the `EntityStore` seam the concurrency
//! layer is written against. In production that seam fronts a SQL engine;
//! here each record sits behind its own mutex, which plays the part of the
//! engine's row lock plus transaction boundary:
//!
//! - `update_with_version` is the `UPDATE ... WHERE id = ? AND version = ?`
//!   compare-and-swap, reporting whether a row was affected
//! - `with_row_lock` is `SELECT ... FOR UPDATE` inside a transaction: the
//!   closure works on a private copy, and only a successful return commits
//!   it (with a version bump); failure discards the copy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::MemoryEntityStore;
