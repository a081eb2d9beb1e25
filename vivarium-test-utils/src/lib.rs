//! VIVARIUM Test Utilities
//!
//! Centralized test infrastructure for the VIVARIUM workspace:
//! - Proptest generators for entity types
//! - In-memory store re-export and a fault-injecting wrapper
//! - Fixtures for common colony scenarios
//! - Custom assertions for scheduling invariants

// Re-export the in-memory store from its source crate
pub use vivarium_storage::MemoryStore;

// Re-export core types for convenience
pub use vivarium_core::{
    Animal, AnimalStatus, Cohort, ColonyResult, EegImplantTiming, ExperimentRecord,
    ExperimentStatus, ExperimentType, ProtocolConfig, ScheduleError, ScheduleResult, StepKey,
    StoreError, StoreResult, Timepoint, TimelineAnchors,
    // Entity id aliases
    AnimalId, CohortId, ExperimentId, ResultId, TimepointId,
};

use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;
use vivarium_storage::{ColonyStore, ExperimentFilter, ExperimentUpdate};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// `MemoryStore` wrapper that fails one chosen `experiment_insert_batch`
/// call, for exercising the partial-batch-failure contract: earlier batches
/// stay committed, the failing batch index is reported, and re-running the
/// idempotent scheduler completes the remainder.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    insert_calls: AtomicUsize,
    /// Call index to fail on; `usize::MAX` means disarmed.
    fail_insert_at: AtomicUsize,
}

impl FlakyStore {
    pub fn wrapping(inner: MemoryStore) -> Self {
        Self {
            inner,
            insert_calls: AtomicUsize::new(0),
            fail_insert_at: AtomicUsize::new(usize::MAX),
        }
    }

    /// Arm a one-shot failure on the `call_index`-th insert-batch call
    /// (0-based). The fuse disarms after firing, so retries succeed.
    pub fn fail_insert_batch_at(&self, call_index: usize) {
        self.fail_insert_at.store(call_index, Ordering::SeqCst);
    }

    /// The wrapped store, for direct seeding and assertions.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl ColonyStore for FlakyStore {
    fn timepoint_list(&self) -> StoreResult<Vec<Timepoint>> {
        self.inner.timepoint_list()
    }

    fn timepoint_by_age(&self, age_days: i64) -> StoreResult<Option<Timepoint>> {
        self.inner.timepoint_by_age(age_days)
    }

    fn cohort_get(&self, id: CohortId) -> StoreResult<Option<Cohort>> {
        self.inner.cohort_get(id)
    }

    fn animal_get(&self, id: AnimalId) -> StoreResult<Option<Animal>> {
        self.inner.animal_get(id)
    }

    fn animal_list_by_cohort(
        &self,
        cohort_id: CohortId,
        status: Option<AnimalStatus>,
    ) -> StoreResult<Vec<Animal>> {
        self.inner.animal_list_by_cohort(cohort_id, status)
    }

    fn animal_list_by_ids(&self, ids: &[AnimalId]) -> StoreResult<Vec<Animal>> {
        self.inner.animal_list_by_ids(ids)
    }

    fn experiment_list_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> StoreResult<Vec<ExperimentRecord>> {
        self.inner.experiment_list_by_animal(animal_id)
    }

    fn experiment_page(
        &self,
        filter: &ExperimentFilter,
        after: Option<ExperimentId>,
        limit: usize,
    ) -> StoreResult<Vec<ExperimentRecord>> {
        self.inner.experiment_page(filter, after, limit)
    }

    fn experiment_insert_batch(&self, rows: &[ExperimentRecord]) -> StoreResult<()> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_insert_at.load(Ordering::SeqCst) {
            self.fail_insert_at.store(usize::MAX, Ordering::SeqCst);
            return Err(StoreError::InsertFailed {
                table: "animal_experiments".to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        self.inner.experiment_insert_batch(rows)
    }

    fn experiment_update_batch(
        &self,
        updates: &[(ExperimentId, ExperimentUpdate)],
    ) -> StoreResult<()> {
        self.inner.experiment_update_batch(updates)
    }

    fn experiment_delete_batch(&self, ids: &[ExperimentId]) -> StoreResult<()> {
        self.inner.experiment_delete_batch(ids)
    }

    fn result_update_age(&self, old_age: i64, new_age: i64) -> StoreResult<usize> {
        self.inner.result_update_age(old_age, new_age)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating VIVARIUM entity types.

    use super::*;
    use proptest::prelude::*;
    use vivarium_core::entities::add_days;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid UUIDv7 (timestamp-sortable).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    /// Generate a birth date between 2020 and 2030.
    pub fn arb_birth_date() -> impl Strategy<Value = NaiveDate> {
        (0i64..3650).prop_map(|offset| {
            add_days(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), offset)
        })
    }

    /// Generate a plausible timepoint age in days.
    pub fn arb_age_days() -> impl Strategy<Value = i64> {
        1i64..730
    }

    /// Generate an AnimalStatus variant.
    pub fn arb_animal_status() -> impl Strategy<Value = AnimalStatus> {
        prop_oneof![
            Just(AnimalStatus::Active),
            Just(AnimalStatus::Sacrificed),
            Just(AnimalStatus::Transferred),
            Just(AnimalStatus::Deceased),
            Just(AnimalStatus::Retired),
        ]
    }

    /// Generate an ExperimentStatus variant.
    pub fn arb_experiment_status() -> impl Strategy<Value = ExperimentStatus> {
        prop_oneof![
            Just(ExperimentStatus::Pending),
            Just(ExperimentStatus::Scheduled),
            Just(ExperimentStatus::InProgress),
            Just(ExperimentStatus::Completed),
            Just(ExperimentStatus::Skipped),
        ]
    }

    /// Generate an ExperimentType variant.
    pub fn arb_experiment_type() -> impl Strategy<Value = ExperimentType> {
        prop_oneof![
            Just(ExperimentType::Handling),
            Just(ExperimentType::YMaze),
            Just(ExperimentType::Marble),
            Just(ExperimentType::Ldb),
            Just(ExperimentType::Nesting),
            Just(ExperimentType::DataCollection),
            Just(ExperimentType::CoreAcclimation),
            Just(ExperimentType::Catwalk),
            Just(ExperimentType::RotarodHab),
            Just(ExperimentType::RotarodTest1),
            Just(ExperimentType::RotarodTest2),
            Just(ExperimentType::Stamina),
            Just(ExperimentType::EegImplant),
            Just(ExperimentType::EegRecording),
            Just(ExperimentType::BloodDraw),
        ]
    }

    /// Generate an EegImplantTiming variant.
    pub fn arb_implant_timing() -> impl Strategy<Value = EegImplantTiming> {
        prop_oneof![Just(EegImplantTiming::Before), Just(EegImplantTiming::After)]
    }

    /// Generate a Timepoint with realistic knobs. EEG flag and timing vary.
    pub fn arb_timepoint() -> impl Strategy<Value = Timepoint> {
        (
            "[a-z0-9-]{3,20}",
            arb_age_days(),
            0i64..10,
            1i64..60,
            any::<bool>(),
            arb_implant_timing(),
            1i64..14,
            1i64..7,
        )
            .prop_map(
                |(name, age_days, handling, grace, eeg, timing, recovery, recording)| {
                    let mut tp = Timepoint::new(name, age_days);
                    tp.handling_days_before = handling;
                    tp.grace_period_days = grace;
                    tp.includes_eeg_implant = eeg;
                    tp.eeg_implant_timing = timing;
                    tp.eeg_recovery_days = recovery;
                    tp.eeg_recording_days = recording;
                    tp
                },
            )
    }

    /// Generate an Animal, optionally in a cohort, with a known birth date.
    pub fn arb_animal(cohort_id: Option<CohortId>) -> impl Strategy<Value = Animal> {
        ("[a-z0-9]{2,12}", arb_birth_date(), arb_animal_status()).prop_map(
            move |(name, birth, status)| {
                let mut animal = Animal::new(name, cohort_id).with_birth_date(birth);
                animal.status = status;
                animal
            },
        )
    }

    /// Generate an ExperimentRecord for a fixed animal.
    pub fn arb_experiment_record(animal_id: AnimalId) -> impl Strategy<Value = ExperimentRecord> {
        (
            arb_experiment_type(),
            arb_age_days(),
            arb_birth_date(),
            arb_experiment_status(),
        )
            .prop_map(move |(experiment_type, age, date, status)| {
                let mut record =
                    ExperimentRecord::scheduled(animal_id, experiment_type, age, date, None);
                record.status = status;
                record
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common colony scenarios.

    use super::*;

    /// A typical three-milestone protocol template: plain 30-day, EEG 60-day
    /// (implant after the battery), plain 120-day.
    pub fn battery_timepoints() -> Vec<Timepoint> {
        vec![
            Timepoint::new("30-day", 30).with_sort_order(1),
            Timepoint::new("60-day", 60)
                .with_eeg(EegImplantTiming::After)
                .with_sort_order(2),
            Timepoint::new("120-day", 120).with_sort_order(3),
        ]
    }

    /// A store pre-loaded with `battery_timepoints`.
    pub fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for tp in battery_timepoints() {
            store.insert_timepoint(tp).expect("seed timepoint");
        }
        store
    }

    /// A seeded store plus a cohort of `animal_count` active animals sharing
    /// `birth_date`. Each animal carries the birth date on its own row too,
    /// as litter records do.
    pub fn seeded_colony(
        animal_count: usize,
        birth_date: NaiveDate,
    ) -> (MemoryStore, CohortId, Vec<AnimalId>) {
        let store = seeded_store();
        let cohort = Cohort::new("test-cohort", Some(birth_date));
        let cohort_id = cohort.id;
        store.insert_cohort(cohort).expect("seed cohort");

        let mut animal_ids = Vec::with_capacity(animal_count);
        for i in 0..animal_count {
            let animal =
                Animal::new(format!("m{}", i + 1), Some(cohort_id)).with_birth_date(birth_date);
            animal_ids.push(animal.id);
            store.insert_animal(animal).expect("seed animal");
        }
        (store, cohort_id, animal_ids)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for scheduling invariants.

    use super::*;
    use std::collections::HashMap;

    /// Assert the dedup invariant: at most one non-skipped record per
    /// `(animal, experiment type, timepoint age)` key.
    #[track_caller]
    pub fn assert_at_most_one_active_per_key(records: &[ExperimentRecord]) {
        let mut active: HashMap<(AnimalId, StepKey), usize> = HashMap::new();
        for record in records {
            if record.status.is_active() {
                *active.entry((record.animal_id, record.step_key())).or_default() += 1;
            }
        }
        for ((animal_id, key), count) in active {
            assert!(
                count <= 1,
                "{} active records for animal {} at {:?}",
                count,
                animal_id,
                key
            );
        }
    }

    /// Assert no two records share an id.
    #[track_caller]
    pub fn assert_unique_ids(records: &[ExperimentRecord]) {
        let mut seen = std::collections::HashSet::new();
        for record in records {
            assert!(seen.insert(record.id), "duplicate record id {}", record.id);
        }
    }

    /// Assert every record's scheduled date is on or before `deadline`.
    #[track_caller]
    pub fn assert_all_on_or_before(records: &[ExperimentRecord], deadline: NaiveDate) {
        for record in records {
            assert!(
                record.scheduled_date <= deadline,
                "{} scheduled {} past deadline {}",
                record.experiment_type,
                record.scheduled_date,
                deadline
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_battery_timepoints_fixture() {
        let tps = fixtures::battery_timepoints();
        assert_eq!(tps.len(), 3);
        assert!(tps[1].includes_eeg_implant);
        assert_eq!(tps[1].eeg_implant_timing, EegImplantTiming::After);
        assert!(!tps[0].includes_eeg_implant);
    }

    #[test]
    fn test_seeded_colony_fixture() {
        let birth = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (store, cohort_id, animal_ids) = fixtures::seeded_colony(3, birth);
        assert_eq!(animal_ids.len(), 3);
        let animals = store
            .animal_list_by_cohort(cohort_id, Some(AnimalStatus::Active))
            .unwrap();
        assert_eq!(animals.len(), 3);
    }

    #[test]
    fn test_flaky_store_fails_once_then_recovers() {
        let store = FlakyStore::wrapping(MemoryStore::new());
        store.fail_insert_batch_at(1);
        let row = |age| {
            ExperimentRecord::scheduled(
                Uuid::now_v7(),
                ExperimentType::YMaze,
                age,
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                None,
            )
        };

        store.experiment_insert_batch(&[row(30)]).unwrap();
        let err = store.experiment_insert_batch(&[row(60)]).unwrap_err();
        assert!(matches!(err, StoreError::InsertFailed { .. }));
        // One-shot fuse: the retry lands.
        store.experiment_insert_batch(&[row(60)]).unwrap();
        assert_eq!(store.inner().experiment_count(), 2);
    }

    #[test]
    fn test_active_key_assertion_catches_duplicates() {
        let animal_id = Uuid::now_v7();
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let a = ExperimentRecord::scheduled(animal_id, ExperimentType::YMaze, 30, date, None);
        let mut b = a.clone();
        b.id = Uuid::now_v7();
        b.status = ExperimentStatus::Skipped;
        // One active + one skipped on the same key is fine.
        assertions::assert_at_most_one_active_per_key(&[a, b]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_timepoints_have_positive_age(tp in generators::arb_timepoint()) {
            prop_assert!(tp.age_days > 0);
            prop_assert!(tp.grace_period_days > 0);
        }

        #[test]
        fn prop_generated_animals_have_birth_dates(
            animal in generators::arb_animal(None)
        ) {
            prop_assert!(animal.birth_date.is_some());
        }

        #[test]
        fn prop_generated_records_keep_their_animal(
            record in generators::arb_experiment_record(Uuid::now_v7())
        ) {
            prop_assert_eq!(record.step_key().experiment_type, record.experiment_type);
        }
    }
}
