//! Cohort batch scheduler
//!
//! Fans the single-animal expansion out over every active animal in a
//! cohort in one pass. Existing records for the whole cohort are preloaded
//! through the paginated scan, so the loop does no per-animal reads.

use crate::plan::{
    implant_timepoint_age, plan_timepoint, select_timepoints, DedupIndex, EegState, PlannedWrites,
};
use crate::{insert_batched, update_batched, CohortOutcome, COHORT_INSERT_BATCH_SIZE};
use tracing::info;
use vivarium_core::{AnimalStatus, CohortId, ProtocolConfig, ScheduleError, ScheduleResult};
use vivarium_storage::{scan_experiments, ColonyStore, ExperimentFilter};

/// Schedule every active animal in `cohort_id`.
///
/// An animal's own birth date wins; the cohort's shared birth date is the
/// fallback. Zero net change is a success (everything already scheduled),
/// so the operation is safe to repeat.
pub fn schedule_cohort(
    store: &dyn ColonyStore,
    cfg: &ProtocolConfig,
    cohort_id: CohortId,
    timepoint_filter: Option<&[i64]>,
) -> ScheduleResult<CohortOutcome> {
    let cohort = store
        .cohort_get(cohort_id)?
        .ok_or(ScheduleError::CohortNotFound { cohort_id })?;
    let animals = store.animal_list_by_cohort(cohort_id, Some(AnimalStatus::Active))?;
    if animals.is_empty() {
        return Err(ScheduleError::NoActiveAnimals { cohort_id });
    }

    let all_timepoints = store.timepoint_list()?;
    let implant_tp_age = implant_timepoint_age(&all_timepoints);
    let selected = select_timepoints(all_timepoints, timepoint_filter)?;

    // One preload for the whole cohort instead of one query per animal.
    let animal_ids: Vec<_> = animals.iter().map(|a| a.id).collect();
    let existing = scan_experiments(store, &ExperimentFilter::for_animals(animal_ids))?;
    let mut index = DedupIndex::from_records(&existing);
    let implanted_animals = index.animals_with_implant();

    let mut out = PlannedWrites::default();
    let mut animals_touched = 0;

    for animal in &animals {
        let birth_date = animal
            .birth_date
            .or(cohort.birth_date)
            .ok_or(ScheduleError::MissingBirthDate {
                animal_id: animal.id,
            })?;
        let mut eeg = EegState {
            implant_done: implanted_animals.contains(&animal.id),
        };

        let mut queued_for_animal = 0;
        for tp in &selected {
            queued_for_animal += plan_timepoint(
                cfg,
                animal.id,
                birth_date,
                tp,
                implant_tp_age,
                &mut eeg,
                &mut index,
                &mut out,
            );
        }
        if queued_for_animal > 0 {
            animals_touched += 1;
        }
    }

    update_batched(store, &out.reactivations)?;
    insert_batched(store, &out.inserts, COHORT_INSERT_BATCH_SIZE)?;

    let outcome = CohortOutcome {
        animals_touched,
        total_changed: out.total(),
    };
    info!(
        %cohort_id,
        animals = animals.len(),
        animals_touched = outcome.animals_touched,
        total_changed = outcome.total_changed,
        "scheduled cohort"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use vivarium_core::{
        Animal, Cohort, EegImplantTiming, ExperimentType, StepKey, Timepoint,
    };
    use vivarium_storage::MemoryStore;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seeded_store(animal_count: usize) -> (MemoryStore, CohortId, Vec<uuid::Uuid>) {
        let store = MemoryStore::new();
        store
            .insert_timepoint(Timepoint::new("30-day", 30).with_sort_order(1))
            .unwrap();
        store
            .insert_timepoint(
                Timepoint::new("60-day", 60)
                    .with_eeg(EegImplantTiming::After)
                    .with_sort_order(2),
            )
            .unwrap();

        let cohort = Cohort::new("BPAN 3", Some(d("2024-01-01")));
        let cohort_id = cohort.id;
        store.insert_cohort(cohort).unwrap();

        let mut ids = Vec::new();
        for i in 0..animal_count {
            let animal = Animal::new(format!("m{}", i), Some(cohort_id));
            ids.push(animal.id);
            store.insert_animal(animal).unwrap();
        }
        (store, cohort_id, ids)
    }

    #[test]
    fn test_cohort_not_found() {
        let store = MemoryStore::new();
        let err = schedule_cohort(
            &store,
            &ProtocolConfig::default(),
            uuid::Uuid::now_v7(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ScheduleError::CohortNotFound { .. }));
    }

    #[test]
    fn test_no_active_animals() {
        let store = MemoryStore::new();
        let cohort = Cohort::new("empty", Some(d("2024-01-01")));
        let cohort_id = cohort.id;
        store.insert_cohort(cohort).unwrap();
        let err =
            schedule_cohort(&store, &ProtocolConfig::default(), cohort_id, None).unwrap_err();
        assert_eq!(err, ScheduleError::NoActiveAnimals { cohort_id });
    }

    #[test]
    fn test_cohort_schedules_all_animals_once() {
        let (store, cohort_id, ids) = seeded_store(3);
        let cfg = ProtocolConfig::default();

        let first = schedule_cohort(&store, &cfg, cohort_id, None).unwrap();
        assert_eq!(first.animals_touched, 3);
        // Per animal: 13 at 30d (battery + plasma), 15 at 60d (battery +
        // implant + recording + plasma).
        assert_eq!(first.total_changed, 3 * 28);

        // Every animal got exactly one implant.
        for id in &ids {
            let implants = store
                .experiment_list_by_animal(*id)
                .unwrap()
                .into_iter()
                .filter(|r| r.experiment_type == ExperimentType::EegImplant)
                .count();
            assert_eq!(implants, 1);
        }

        // Repeat is a non-error no-op.
        let second = schedule_cohort(&store, &cfg, cohort_id, None).unwrap();
        assert_eq!(second, CohortOutcome::default());
    }

    #[test]
    fn test_animal_birth_date_overrides_cohort() {
        let (store, cohort_id, ids) = seeded_store(2);
        // Give the first animal its own, later birth date.
        let mut animal = store.animal_get(ids[0]).unwrap().unwrap();
        animal.birth_date = Some(d("2024-02-01"));
        store.insert_animal(animal).unwrap();

        schedule_cohort(&store, &ProtocolConfig::default(), cohort_id, Some(&[30])).unwrap();

        let ymaze_dates: HashMap<uuid::Uuid, NaiveDate> = ids
            .iter()
            .map(|id| {
                let date = store
                    .experiment_list_by_animal(*id)
                    .unwrap()
                    .into_iter()
                    .find(|r| r.step_key() == StepKey::new(ExperimentType::YMaze, 30))
                    .unwrap()
                    .scheduled_date;
                (*id, date)
            })
            .collect();
        assert_eq!(ymaze_dates[&ids[0]], d("2024-03-02"));
        assert_eq!(ymaze_dates[&ids[1]], d("2024-01-31"));
    }

    #[test]
    fn test_partial_state_completes_on_rerun() {
        let (store, cohort_id, ids) = seeded_store(2);
        let cfg = ProtocolConfig::default();

        // One animal was already scheduled individually.
        crate::schedule_animal(&store, &cfg, ids[0], d("2024-01-01"), None).unwrap();

        let outcome = schedule_cohort(&store, &cfg, cohort_id, None).unwrap();
        assert_eq!(outcome.animals_touched, 1);
        assert_eq!(outcome.total_changed, 28);
    }
}
