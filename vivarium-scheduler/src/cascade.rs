//! Template-edit cascades
//!
//! Experiment records join to their timepoint by numeric age, not by id, so
//! editing a timepoint's `age_days` orphans every record keyed to the old
//! age. The cascade re-keys them (and the result rows) and re-derives the
//! scheduled date as a flat `birth + new_age` shift. Unlike the grace-period
//! rescheduler this is a best-effort batch repair: it applies to ALL
//! statuses, ignores the grace deadline, and does not re-run the anchor
//! calculator's EEG branches.

use crate::{update_batched, CascadeOutcome};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::info;
use vivarium_core::entities::add_days;
use vivarium_core::{AnimalId, CohortId, ScheduleError, ScheduleResult};
use vivarium_storage::{scan_experiments, ColonyStore, ExperimentFilter, ExperimentUpdate};

/// Shift every experiment record and result row keyed at `old_age` to
/// `new_age`, recomputing scheduled dates where the animal's birth date is
/// known.
pub fn cascade_timepoint_age_change(
    store: &dyn ColonyStore,
    old_age: i64,
    new_age: i64,
) -> ScheduleResult<CascadeOutcome> {
    if old_age == new_age {
        return Ok(CascadeOutcome::default());
    }

    let affected = scan_experiments(store, &ExperimentFilter::for_age(old_age))?;

    let animal_ids: Vec<AnimalId> = affected
        .iter()
        .map(|r| r.animal_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let birth_dates: HashMap<AnimalId, NaiveDate> = store
        .animal_list_by_ids(&animal_ids)?
        .into_iter()
        .filter_map(|a| a.birth_date.map(|b| (a.id, b)))
        .collect();

    let updates: Vec<_> = affected
        .iter()
        .map(|record| {
            (
                record.id,
                ExperimentUpdate {
                    timepoint_age_days: Some(new_age),
                    scheduled_date: birth_dates
                        .get(&record.animal_id)
                        .map(|birth| add_days(*birth, new_age)),
                    ..Default::default()
                },
            )
        })
        .collect();
    update_batched(store, &updates)?;

    let results_updated = store.result_update_age(old_age, new_age)?;

    let outcome = CascadeOutcome {
        experiments_updated: updates.len(),
        results_updated,
    };
    info!(
        old_age,
        new_age,
        experiments = outcome.experiments_updated,
        results = outcome.results_updated,
        "cascaded timepoint age change"
    );
    Ok(outcome)
}

/// Shift every unfinished record of every animal in a cohort after the
/// cohort's shared birth date changed: `scheduled_date = new_birth +
/// timepoint_age_days`. Completed and skipped history stays put; updating
/// the animal rows themselves is the caller's CRUD concern.
pub fn cascade_cohort_birth_date_change(
    store: &dyn ColonyStore,
    cohort_id: CohortId,
    new_birth_date: NaiveDate,
) -> ScheduleResult<CascadeOutcome> {
    store
        .cohort_get(cohort_id)?
        .ok_or(ScheduleError::CohortNotFound { cohort_id })?;
    let animals = store.animal_list_by_cohort(cohort_id, None)?;
    if animals.is_empty() {
        return Ok(CascadeOutcome::default());
    }

    let animal_ids: Vec<AnimalId> = animals.iter().map(|a| a.id).collect();
    let records = scan_experiments(store, &ExperimentFilter::for_animals(animal_ids))?;

    let updates: Vec<_> = records
        .iter()
        .filter(|r| r.status.is_unfinished())
        .map(|record| {
            (
                record.id,
                ExperimentUpdate {
                    scheduled_date: Some(add_days(new_birth_date, record.timepoint_age_days)),
                    ..Default::default()
                },
            )
        })
        .collect();
    update_batched(store, &updates)?;

    info!(
        %cohort_id,
        %new_birth_date,
        experiments = updates.len(),
        "cascaded cohort birth date change"
    );
    Ok(CascadeOutcome {
        experiments_updated: updates.len(),
        results_updated: 0,
    })
}
