//! VIVARIUM Scheduler - Protocol Scheduling Engine
//!
//! Given an animal's birth date and a configurable multi-step protocol,
//! deterministically computes every experiment's due date, reconciles
//! against existing records without duplicating work, and keeps scheduled
//! work consistent when reality slips (grace-period rescheduling) or the
//! protocol template changes (timepoint cascades).
//!
//! Concurrency model: every operation is one request-scoped, sequential set
//! of read-then-write calls. Overlapping calls for the same animal are not
//! mutually excluded here; a backend enforcing uniqueness on
//! `(animal_id, experiment_type, timepoint_age_days)` over non-skipped rows
//! closes that race. Within one call, writes go out in bounded batches; a
//! failure partway leaves earlier batches committed, and the recovery path
//! is to re-run the idempotent scheduling call.

pub mod animal;
pub mod cascade;
pub mod cohort;
pub mod plan;
pub mod purge;
pub mod reschedule;
pub mod status;

pub use animal::schedule_animal;
pub use cascade::{cascade_cohort_birth_date_change, cascade_timepoint_age_change};
pub use cohort::schedule_cohort;
pub use purge::{purge_animal_experiments, purge_cohort_experiments};
pub use reschedule::reschedule_timepoint;
pub use status::update_status_bulk;

use serde::{Deserialize, Serialize};
use vivarium_storage::{ColonyStore, ExperimentUpdate};
use vivarium_core::{ExperimentId, ExperimentRecord, ScheduleError, ScheduleResult};

// ============================================================================
// WRITE BATCHING
// ============================================================================

/// Rows per bulk insert on the single-animal path.
pub const INSERT_BATCH_SIZE: usize = 50;
/// Rows per bulk insert on the cohort path.
pub const COHORT_INSERT_BATCH_SIZE: usize = 200;
/// Rows per bulk update.
pub const UPDATE_BATCH_SIZE: usize = 100;
/// Rows per bulk delete.
pub const DELETE_BATCH_SIZE: usize = 100;

/// Insert records in bounded batches, tagging failures with the batch index.
pub(crate) fn insert_batched(
    store: &dyn ColonyStore,
    rows: &[ExperimentRecord],
    batch_size: usize,
) -> ScheduleResult<()> {
    for (batch_index, batch) in rows.chunks(batch_size).enumerate() {
        store
            .experiment_insert_batch(batch)
            .map_err(|source| ScheduleError::BatchWriteFailed {
                batch_index,
                source,
            })?;
    }
    Ok(())
}

/// Apply per-id updates in bounded batches.
pub(crate) fn update_batched(
    store: &dyn ColonyStore,
    updates: &[(ExperimentId, ExperimentUpdate)],
) -> ScheduleResult<()> {
    for (batch_index, batch) in updates.chunks(UPDATE_BATCH_SIZE).enumerate() {
        store
            .experiment_update_batch(batch)
            .map_err(|source| ScheduleError::BatchWriteFailed {
                batch_index,
                source,
            })?;
    }
    Ok(())
}

/// Delete records in bounded batches.
pub(crate) fn delete_batched(
    store: &dyn ColonyStore,
    ids: &[ExperimentId],
) -> ScheduleResult<()> {
    for (batch_index, batch) in ids.chunks(DELETE_BATCH_SIZE).enumerate() {
        store
            .experiment_delete_batch(batch)
            .map_err(|source| ScheduleError::BatchWriteFailed {
                batch_index,
                source,
            })?;
    }
    Ok(())
}

// ============================================================================
// OUTCOME TYPES
// ============================================================================

/// Result of scheduling one animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Fresh records inserted.
    pub created: usize,
    /// Skipped records flipped back to scheduled.
    pub reactivated: usize,
}

impl ScheduleOutcome {
    /// Total records changed.
    pub fn total(&self) -> usize {
        self.created + self.reactivated
    }
}

/// Result of scheduling a whole cohort. Zero counts mean everything was
/// already scheduled; that is a success, not an error, so the operation is
/// safely repeatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CohortOutcome {
    /// Animals that got at least one new or reactivated record.
    pub animals_touched: usize,
    /// Inserted plus reactivated records, across all animals.
    pub total_changed: usize,
}

/// Result of a grace-period reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RescheduleOutcome {
    pub rescheduled: usize,
    /// The latest rescheduled date, if anything moved.
    pub last_date: Option<chrono::NaiveDate>,
}

/// Result of a timepoint-edit or birth-date cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub experiments_updated: usize,
    pub results_updated: usize,
}

/// Result of a bulk status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusUpdateOutcome {
    pub updated: usize,
}

/// Result of a bulk deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PurgeOutcome {
    pub deleted: usize,
}
