//! Grace-period rescheduler
//!
//! When the real world falls behind plan, the unfinished steps of one
//! timepoint are repacked to run in protocol order from a new start date,
//! bounded by a hard deadline at `birth + age + grace_period`. The check is
//! all-or-nothing: every computed date is validated before any write.

use crate::{update_batched, RescheduleOutcome};
use chrono::NaiveDate;
use tracing::info;
use vivarium_core::entities::add_days;
use vivarium_core::{
    AnimalId, ExperimentStatus, ProtocolConfig, ScheduleError, ScheduleResult,
};
use vivarium_storage::{ColonyStore, ExperimentUpdate};

/// Sort rank for record types missing from the canonical offset map
/// (operator-created extras); they trail every known step.
const UNKNOWN_STEP_OFFSET: i64 = 99;

/// Reschedule the unfinished records of one timepoint to run from
/// `new_start_date`, preserving the protocol's relative spacing.
///
/// Completed and skipped records are never touched. On success every moved
/// record is forced back to `scheduled`, since the work is being replanned.
pub fn reschedule_timepoint(
    store: &dyn ColonyStore,
    cfg: &ProtocolConfig,
    animal_id: AnimalId,
    timepoint_age_days: i64,
    new_start_date: NaiveDate,
    birth_date: NaiveDate,
) -> ScheduleResult<RescheduleOutcome> {
    let tp = store
        .timepoint_by_age(timepoint_age_days)?
        .ok_or(ScheduleError::TimepointNotFound {
            age_days: timepoint_age_days,
        })?;

    let mut records: Vec<_> = store
        .experiment_list_by_animal(animal_id)?
        .into_iter()
        .filter(|r| r.timepoint_age_days == timepoint_age_days && r.status.is_unfinished())
        .collect();
    if records.is_empty() {
        return Ok(RescheduleOutcome::default());
    }

    // The rescheduler reasons in relative offsets, not absolute dates: the
    // canonical map covers the fixed steps plus this timepoint's handling
    // and EEG/plasma offsets.
    let offsets = cfg.offset_map(&tp);
    let offset_of = |record: &vivarium_core::ExperimentRecord| {
        offsets
            .get(&record.experiment_type)
            .copied()
            .unwrap_or(UNKNOWN_STEP_OFFSET)
    };
    records.sort_by_key(|r| (offset_of(r), r.experiment_type));

    let deadline = add_days(birth_date, timepoint_age_days + tp.grace_period_days);
    let first_offset = offset_of(&records[0]);

    // Validate every date before writing anything.
    let mut updates = Vec::with_capacity(records.len());
    let mut last_date = new_start_date;
    for record in &records {
        let relative = offset_of(record) - first_offset;
        let new_date = add_days(new_start_date, relative.max(0));
        if new_date > deadline {
            return Err(ScheduleError::DeadlineExceeded {
                experiment_type: record.experiment_type,
                scheduled: new_date,
                deadline,
            });
        }
        updates.push((
            record.id,
            ExperimentUpdate {
                scheduled_date: Some(new_date),
                status: Some(ExperimentStatus::Scheduled),
                ..Default::default()
            },
        ));
        last_date = new_date;
    }

    update_batched(store, &updates)?;

    info!(
        %animal_id,
        age_days = timepoint_age_days,
        rescheduled = updates.len(),
        %last_date,
        "rescheduled timepoint"
    );
    Ok(RescheduleOutcome {
        rescheduled: updates.len(),
        last_date: Some(last_date),
    })
}
