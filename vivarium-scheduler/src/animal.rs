//! Single-animal scheduler

use crate::plan::{
    implant_timepoint_age, plan_timepoint, select_timepoints, DedupIndex, EegState, PlannedWrites,
};
use crate::{insert_batched, update_batched, ScheduleOutcome, INSERT_BATCH_SIZE};
use chrono::NaiveDate;
use tracing::{debug, info};
use vivarium_core::{AnimalId, ProtocolConfig, ScheduleResult};
use vivarium_storage::ColonyStore;

/// Expand the protocol into concrete experiment records for one animal,
/// reconciled against its existing records.
///
/// `timepoint_filter` limits scope to the named ages; `None` (or an empty
/// slice) schedules every configured timepoint. Idempotent: a second call
/// with the same inputs and no intervening edits changes nothing.
pub fn schedule_animal(
    store: &dyn ColonyStore,
    cfg: &ProtocolConfig,
    animal_id: AnimalId,
    birth_date: NaiveDate,
    timepoint_filter: Option<&[i64]>,
) -> ScheduleResult<ScheduleOutcome> {
    let all_timepoints = store.timepoint_list()?;
    // The implant site is chosen from the FULL list, not the filtered one.
    let implant_tp_age = implant_timepoint_age(&all_timepoints);
    let selected = select_timepoints(all_timepoints, timepoint_filter)?;

    let existing = store.experiment_list_by_animal(animal_id)?;
    let mut index = DedupIndex::from_records(&existing);
    let mut eeg = EegState {
        implant_done: index.animals_with_implant().contains(&animal_id),
    };

    let mut out = PlannedWrites::default();
    for tp in &selected {
        let queued = plan_timepoint(
            cfg,
            animal_id,
            birth_date,
            tp,
            implant_tp_age,
            &mut eeg,
            &mut index,
            &mut out,
        );
        debug!(age_days = tp.age_days, queued, "expanded timepoint");
    }

    // Reactivations reuse existing row ids and must land before the inserts.
    update_batched(store, &out.reactivations)?;
    insert_batched(store, &out.inserts, INSERT_BATCH_SIZE)?;

    let outcome = ScheduleOutcome {
        created: out.inserts.len(),
        reactivated: out.reactivations.len(),
    };
    info!(
        %animal_id,
        created = outcome.created,
        reactivated = outcome.reactivated,
        "scheduled animal"
    );
    Ok(outcome)
}
