//! Bulk status updates
//!
//! Marks experiments across cohorts, timepoints, and experiment types in
//! one call ("mark all marble and nesting at 30d and 120d as skipped").
//! Completion bookkeeping follows the record lifecycle: moving to
//! `completed` stamps `completed_date`, moving away from it clears it.

use crate::{update_batched, StatusUpdateOutcome};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::info;
use vivarium_core::{
    AnimalId, CohortId, ExperimentStatus, ExperimentType, ScheduleError, ScheduleResult,
};
use vivarium_storage::{scan_experiments, ColonyStore, ExperimentFilter, ExperimentUpdate};

/// Update the status of every experiment matching the selection.
///
/// `cohort_ids` empty means all cohorts. `timepoint_ages` and
/// `experiment_types` must both be non-empty; an empty match set is a
/// success with a zero count. `today` stamps `completed_date` when moving
/// records into `completed`.
pub fn update_status_bulk(
    store: &dyn ColonyStore,
    cohort_ids: &[CohortId],
    timepoint_ages: &[i64],
    experiment_types: &[ExperimentType],
    new_status: ExperimentStatus,
    today: NaiveDate,
) -> ScheduleResult<StatusUpdateOutcome> {
    if timepoint_ages.is_empty() || experiment_types.is_empty() {
        return Err(ScheduleError::InvalidSelection {
            reason: "select at least one timepoint and one experiment type".to_string(),
        });
    }

    // Cohort restriction resolves to an animal id set; no restriction scans
    // every record at the selected ages.
    let animal_ids: Option<Vec<AnimalId>> = if cohort_ids.is_empty() {
        None
    } else {
        let mut ids = Vec::new();
        for cohort_id in cohort_ids {
            let animals = store.animal_list_by_cohort(*cohort_id, None)?;
            ids.extend(animals.into_iter().map(|a| a.id));
        }
        Some(ids)
    };

    let mut matching_ids = Vec::new();
    let mut seen = HashSet::new();
    for &age in timepoint_ages {
        let filter = ExperimentFilter {
            animal_ids: animal_ids.clone(),
            timepoint_age_days: Some(age),
            statuses: None,
        };
        for record in scan_experiments(store, &filter)? {
            if experiment_types.contains(&record.experiment_type) && seen.insert(record.id) {
                matching_ids.push(record.id);
            }
        }
    }

    let completed_date = match new_status {
        ExperimentStatus::Completed => Some(Some(today)),
        ExperimentStatus::Scheduled | ExperimentStatus::Pending => Some(None),
        _ => None,
    };
    let updates: Vec<_> = matching_ids
        .iter()
        .map(|id| {
            (
                *id,
                ExperimentUpdate {
                    status: Some(new_status),
                    completed_date,
                    ..Default::default()
                },
            )
        })
        .collect();
    update_batched(store, &updates)?;

    info!(
        updated = updates.len(),
        %new_status,
        "bulk status update"
    );
    Ok(StatusUpdateOutcome {
        updated: updates.len(),
    })
}
