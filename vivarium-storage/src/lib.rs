//! VIVARIUM Storage - Persistence Boundary
//!
//! Defines the storage abstraction the scheduling engine runs against, plus
//! `MemoryStore`, an in-memory implementation used as a test double and as
//! the reference backend. A production backend (SQL or remote API) should
//! additionally carry a unique constraint on
//! `(animal_id, experiment_type, timepoint_age_days)` filtered to non-skipped
//! rows: concurrent scheduling calls are not mutually excluded (see the
//! engine crate docs), so the at-most-one-active-record invariant needs
//! enforcement at the storage boundary too.

pub mod memory;

pub use memory::MemoryStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vivarium_core::{
    Animal, AnimalId, AnimalStatus, Cohort, CohortId, ExperimentId, ExperimentRecord,
    ExperimentStatus, StoreResult, Timepoint,
};

// ============================================================================
// FILTERS AND UPDATE TYPES
// ============================================================================

/// Row filter for experiment queries and scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFilter {
    /// Restrict to these animals.
    pub animal_ids: Option<Vec<AnimalId>>,
    /// Restrict to one timepoint age.
    pub timepoint_age_days: Option<i64>,
    /// Restrict to these statuses.
    pub statuses: Option<Vec<ExperimentStatus>>,
}

impl ExperimentFilter {
    pub fn for_animals(animal_ids: Vec<AnimalId>) -> Self {
        Self {
            animal_ids: Some(animal_ids),
            ..Self::default()
        }
    }

    pub fn for_age(timepoint_age_days: i64) -> Self {
        Self {
            timepoint_age_days: Some(timepoint_age_days),
            ..Self::default()
        }
    }

    pub fn with_age(mut self, timepoint_age_days: i64) -> Self {
        self.timepoint_age_days = Some(timepoint_age_days);
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<ExperimentStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Whether a record passes this filter.
    pub fn matches(&self, record: &ExperimentRecord) -> bool {
        if let Some(ids) = &self.animal_ids {
            if !ids.contains(&record.animal_id) {
                return false;
            }
        }
        if let Some(age) = self.timepoint_age_days {
            if record.timepoint_age_days != age {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&record.status) {
                return false;
            }
        }
        true
    }
}

/// Update payload for experiment records.
///
/// `None` leaves a field untouched. The two nullable columns take a nested
/// `Option`: `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentUpdate {
    pub scheduled_date: Option<NaiveDate>,
    pub completed_date: Option<Option<NaiveDate>>,
    pub status: Option<ExperimentStatus>,
    pub timepoint_age_days: Option<i64>,
    pub notes: Option<Option<String>>,
}

impl ExperimentUpdate {
    /// Apply this update to a record in place.
    pub fn apply(&self, record: &mut ExperimentRecord) {
        if let Some(date) = self.scheduled_date {
            record.scheduled_date = date;
        }
        if let Some(completed) = self.completed_date {
            record.completed_date = completed;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(age) = self.timepoint_age_days {
            record.timepoint_age_days = age;
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
    }
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage trait for colony entities.
///
/// All scheduling operations are sequential read-then-write call sets within
/// one request; implementations need no transaction support beyond applying
/// one bulk call atomically enough to report success or failure for it.
pub trait ColonyStore: Send + Sync {
    // === Timepoint Operations ===

    /// All protocol timepoints, ordered by `sort_order`.
    fn timepoint_list(&self) -> StoreResult<Vec<Timepoint>>;

    /// Look up a timepoint by its nominal age.
    fn timepoint_by_age(&self, age_days: i64) -> StoreResult<Option<Timepoint>>;

    // === Cohort / Animal Operations ===

    /// Get a cohort by ID.
    fn cohort_get(&self, id: CohortId) -> StoreResult<Option<Cohort>>;

    /// Get an animal by ID.
    fn animal_get(&self, id: AnimalId) -> StoreResult<Option<Animal>>;

    /// Animals in a cohort, optionally restricted to one status.
    fn animal_list_by_cohort(
        &self,
        cohort_id: CohortId,
        status: Option<AnimalStatus>,
    ) -> StoreResult<Vec<Animal>>;

    /// Animals by ID set (birth-date lookups for the cascade).
    fn animal_list_by_ids(&self, ids: &[AnimalId]) -> StoreResult<Vec<Animal>>;

    // === Experiment Operations ===

    /// Every experiment record for one animal.
    fn experiment_list_by_animal(&self, animal_id: AnimalId) -> StoreResult<Vec<ExperimentRecord>>;

    /// One page of matching records, ordered by id, strictly after `after`.
    ///
    /// Backs [`scan_experiments`]; ids are UUIDv7 so id order is creation
    /// order and the cursor never skips or repeats rows.
    fn experiment_page(
        &self,
        filter: &ExperimentFilter,
        after: Option<ExperimentId>,
        limit: usize,
    ) -> StoreResult<Vec<ExperimentRecord>>;

    /// Insert one bounded batch of records.
    fn experiment_insert_batch(&self, rows: &[ExperimentRecord]) -> StoreResult<()>;

    /// Apply one bounded batch of per-id updates.
    fn experiment_update_batch(
        &self,
        updates: &[(ExperimentId, ExperimentUpdate)],
    ) -> StoreResult<()>;

    /// Delete one bounded batch of records by id.
    fn experiment_delete_batch(&self, ids: &[ExperimentId]) -> StoreResult<()>;

    // === Result Operations ===

    /// Re-key all result rows from one timepoint age to another.
    /// Returns the number of rows touched.
    fn result_update_age(&self, old_age: i64, new_age: i64) -> StoreResult<usize>;
}

/// Page size for the unbounded scan. Mirrors the payload ceiling assumed for
/// the backing store.
pub const SCAN_PAGE_SIZE: usize = 900;

/// Fetch ALL rows matching a filter using id-cursor pagination.
///
/// The cohort scheduler and the cascades must load record sets with no
/// row-count cap; repeated ordered-cursor pages are more reliable than a
/// single unbounded query against a remote store.
pub fn scan_experiments(
    store: &dyn ColonyStore,
    filter: &ExperimentFilter,
) -> StoreResult<Vec<ExperimentRecord>> {
    let mut all = Vec::new();
    let mut after: Option<ExperimentId> = None;

    loop {
        let page = store.experiment_page(filter, after, SCAN_PAGE_SIZE)?;
        let page_len = page.len();
        if let Some(last) = page.last() {
            after = Some(last.id);
        }
        all.extend(page);
        if page_len < SCAN_PAGE_SIZE {
            break;
        }
    }
    Ok(all)
}
