//! Error types for scheduling operations

use crate::{AnimalId, CohortId, ExperimentType};
use chrono::NaiveDate;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Query failed on {table}: {reason}")]
    QueryFailed { table: String, reason: String },

    #[error("Insert failed on {table}: {reason}")]
    InsertFailed { table: String, reason: String },

    #[error("Update failed on {table}: {reason}")]
    UpdateFailed { table: String, reason: String },

    #[error("Delete failed on {table}: {reason}")]
    DeleteFailed { table: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Scheduling engine errors.
///
/// Configuration and scope errors are surfaced before any write. A deadline
/// violation aborts the whole reschedule with nothing written. A batch write
/// failure leaves earlier batches committed; the documented recovery is to
/// re-run the idempotent scheduling call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("No timepoints configured; add timepoints first")]
    NoTimepointsConfigured,

    #[error("No timepoints match the requested filter")]
    NoMatchingTimepoints,

    #[error("No timepoint configured at age {age_days}d")]
    TimepointNotFound { age_days: i64 },

    #[error("Cohort not found: {cohort_id}")]
    CohortNotFound { cohort_id: CohortId },

    #[error("No active animals in cohort {cohort_id}")]
    NoActiveAnimals { cohort_id: CohortId },

    #[error("Animal {animal_id} has no birth date and its cohort has none either")]
    MissingBirthDate { animal_id: AnimalId },

    #[error("Invalid selection: {reason}")]
    InvalidSelection { reason: String },

    #[error(
        "Cannot reschedule: {experiment_type} would fall on {scheduled}, \
         past the grace deadline of {deadline}"
    )]
    DeadlineExceeded {
        experiment_type: ExperimentType,
        scheduled: NaiveDate,
        deadline: NaiveDate,
    },

    #[error("Write failed at batch {batch_index}: {source}")]
    BatchWriteFailed {
        batch_index: usize,
        source: StoreError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for scheduling operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Aggregate error for callers that cross layers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VivariumError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Result type alias for VIVARIUM operations.
pub type VivariumResult<T> = Result<T, VivariumError>;
