//! Bulk experiment deletion
//!
//! Mass-removal of scheduled work when a protocol is abandoned for an
//! animal or cohort, optionally limited to certain timepoints or statuses.

use crate::{delete_batched, PurgeOutcome};
use tracing::info;
use vivarium_core::{
    AnimalId, CohortId, ExperimentId, ExperimentRecord, ExperimentStatus, ScheduleError,
    ScheduleResult,
};
use vivarium_storage::{scan_experiments, ColonyStore, ExperimentFilter};

fn selected_ids(
    records: impl IntoIterator<Item = ExperimentRecord>,
    ages: Option<&[i64]>,
    statuses: Option<&[ExperimentStatus]>,
) -> Vec<ExperimentId> {
    records
        .into_iter()
        .filter(|r| match ages {
            Some(ages) if !ages.is_empty() => ages.contains(&r.timepoint_age_days),
            _ => true,
        })
        .filter(|r| match statuses {
            Some(statuses) if !statuses.is_empty() => statuses.contains(&r.status),
            _ => true,
        })
        .map(|r| r.id)
        .collect()
}

/// Delete one animal's experiments, optionally limited by timepoint age
/// and/or status. Empty filter slices mean no restriction.
pub fn purge_animal_experiments(
    store: &dyn ColonyStore,
    animal_id: AnimalId,
    ages: Option<&[i64]>,
    statuses: Option<&[ExperimentStatus]>,
) -> ScheduleResult<PurgeOutcome> {
    let records = store.experiment_list_by_animal(animal_id)?;
    let ids = selected_ids(records, ages, statuses);
    delete_batched(store, &ids)?;

    info!(%animal_id, deleted = ids.len(), "purged animal experiments");
    Ok(PurgeOutcome { deleted: ids.len() })
}

/// Delete experiments for every animal in a cohort (any animal status),
/// with the same optional filters. A cohort with no animals has nothing
/// to delete and succeeds with a zero count.
pub fn purge_cohort_experiments(
    store: &dyn ColonyStore,
    cohort_id: CohortId,
    ages: Option<&[i64]>,
    statuses: Option<&[ExperimentStatus]>,
) -> ScheduleResult<PurgeOutcome> {
    store
        .cohort_get(cohort_id)?
        .ok_or(ScheduleError::CohortNotFound { cohort_id })?;
    let animals = store.animal_list_by_cohort(cohort_id, None)?;
    if animals.is_empty() {
        return Ok(PurgeOutcome::default());
    }

    let animal_ids: Vec<AnimalId> = animals.iter().map(|a| a.id).collect();
    let records = scan_experiments(store, &ExperimentFilter::for_animals(animal_ids))?;
    let ids = selected_ids(records, ages, statuses);
    delete_batched(store, &ids)?;

    info!(%cohort_id, deleted = ids.len(), "purged cohort experiments");
    Ok(PurgeOutcome { deleted: ids.len() })
}
