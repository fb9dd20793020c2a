//! Conflict detection and analytics for CrewSync
//!
//! Retrospective mining of the append-only operation log:
//! - [`OperationLog`]: the log store and its window queries
//! - [`ConflictDetector`]: correlates operator-disjoint overlapping edits
//!   into classified [`ConflictRecord`]s
//! - [`ConflictBoard`]: record store, resolution workflow entry point, and
//!   statistics
//! - [`FeatureExtractor`]: flat numeric feature rows for the downstream
//!   training pipeline
//!
//! [`ConflictRecord`]: crewsync_core::ConflictRecord

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod board;
pub mod detector;
pub mod features;
pub mod log;

pub use board::{ConflictBoard, ConflictStatistics};
pub use detector::{ConflictDetector, DetectorConfig};
pub use features::{FeatureExtractor, FeatureRow};
pub use log::OperationLog;
