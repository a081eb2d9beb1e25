//! Partial-batch-failure contract tests
//!
//! Bulk writes go out in bounded batches. A failing batch surfaces its
//! index through `BatchWriteFailed`, earlier batches stay committed, and
//! re-running the idempotent scheduler completes the remainder.

use chrono::NaiveDate;
use vivarium_scheduler::{schedule_animal, schedule_cohort, INSERT_BATCH_SIZE};
use vivarium_storage::ColonyStore;
use vivarium_test_utils::{
    assertions, Animal, Cohort, FlakyStore, MemoryStore, ProtocolConfig, ScheduleError, Timepoint,
};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Five plain timepoints: 13 records each, 65 per animal, so the
/// single-animal path needs two insert batches of 50.
fn five_timepoint_store() -> MemoryStore {
    let store = MemoryStore::new();
    for (i, age) in [30i64, 60, 90, 120, 150].iter().enumerate() {
        store
            .insert_timepoint(Timepoint::new(format!("{age}-day"), *age).with_sort_order(i as i32))
            .unwrap();
    }
    store
}

#[test]
fn test_failed_batch_reports_index_and_keeps_earlier_batches() {
    let store = FlakyStore::wrapping(five_timepoint_store());
    let cfg = ProtocolConfig::default();
    let animal_id = uuid::Uuid::now_v7();

    // Second insert batch (index 1) fails.
    store.fail_insert_batch_at(1);
    let err = schedule_animal(&store, &cfg, animal_id, d("2024-01-01"), None).unwrap_err();
    match err {
        ScheduleError::BatchWriteFailed { batch_index, .. } => assert_eq!(batch_index, 1),
        other => panic!("expected BatchWriteFailed, got {other:?}"),
    }
    // The first batch is committed.
    assert_eq!(store.inner().experiment_count(), INSERT_BATCH_SIZE);

    // Re-running completes the remaining 15 records.
    let outcome = schedule_animal(&store, &cfg, animal_id, d("2024-01-01"), None).unwrap();
    assert_eq!(outcome.created, 65 - INSERT_BATCH_SIZE);
    assert_eq!(outcome.reactivated, 0);

    let records = store.experiment_list_by_animal(animal_id).unwrap();
    assert_eq!(records.len(), 65);
    assertions::assert_unique_ids(&records);
    assertions::assert_at_most_one_active_per_key(&records);

    // A third run is a no-op.
    let third = schedule_animal(&store, &cfg, animal_id, d("2024-01-01"), None).unwrap();
    assert_eq!(third.total(), 0);
}

#[test]
fn test_cohort_first_batch_failure_leaves_store_empty_and_rerun_recovers() {
    let inner = five_timepoint_store();
    let cohort = Cohort::new("BPAN 7", Some(d("2024-01-01")));
    let cohort_id = cohort.id;
    inner.insert_cohort(cohort).unwrap();
    let mut animal_ids = Vec::new();
    for i in 0..4 {
        let animal = Animal::new(format!("m{i}"), Some(cohort_id));
        animal_ids.push(animal.id);
        inner.insert_animal(animal).unwrap();
    }
    let store = FlakyStore::wrapping(inner);
    let cfg = ProtocolConfig::default();

    // 4 animals x 65 records needs two 200-row batches; the first fails.
    store.fail_insert_batch_at(0);
    let err = schedule_cohort(&store, &cfg, cohort_id, None).unwrap_err();
    match err {
        ScheduleError::BatchWriteFailed { batch_index, .. } => assert_eq!(batch_index, 0),
        other => panic!("expected BatchWriteFailed, got {other:?}"),
    }
    assert_eq!(store.inner().experiment_count(), 0, "nothing committed");

    let outcome = schedule_cohort(&store, &cfg, cohort_id, None).unwrap();
    assert_eq!(outcome.animals_touched, 4);
    assert_eq!(outcome.total_changed, 4 * 65);
    for animal_id in &animal_ids {
        let records = store.experiment_list_by_animal(*animal_id).unwrap();
        assert_eq!(records.len(), 65);
        assertions::assert_at_most_one_active_per_key(&records);
    }
}
