//! Shared protocol expansion
//!
//! Both schedulers expand (animal, timepoint) pairs into concrete records
//! through this module: the single-animal path runs it for one animal, the
//! cohort path folds it over every active animal against one preloaded
//! dedup index.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use vivarium_core::entities::add_days;
use vivarium_core::{
    AnimalId, ExperimentId, ExperimentRecord, ExperimentStatus, ExperimentType, ProtocolConfig,
    ScheduleError, ScheduleResult, StepKey, TimelineAnchors, Timepoint,
};
use vivarium_storage::ExperimentUpdate;

/// Apply the optional timepoint filter to the full configured list.
pub(crate) fn select_timepoints(
    all: Vec<Timepoint>,
    filter: Option<&[i64]>,
) -> ScheduleResult<Vec<Timepoint>> {
    if all.is_empty() {
        return Err(ScheduleError::NoTimepointsConfigured);
    }
    let selected: Vec<Timepoint> = match filter {
        Some(ages) if !ages.is_empty() => all
            .into_iter()
            .filter(|tp| ages.contains(&tp.age_days))
            .collect(),
        _ => all,
    };
    if selected.is_empty() {
        return Err(ScheduleError::NoMatchingTimepoints);
    }
    Ok(selected)
}

/// The animal's designated implant timepoint: the first one in sort order
/// configured with an implant, regardless of which timepoints are being
/// processed. `all` must be the FULL configured list.
pub(crate) fn implant_timepoint_age(all: &[Timepoint]) -> Option<i64> {
    all.iter()
        .find(|tp| tp.includes_eeg_implant)
        .map(|tp| tp.age_days)
}

/// Dedup view over existing records, keyed by `(animal, type, age)`.
///
/// Grows as records are planned within a pass, so two timepoints in the same
/// call can never double-schedule one key.
#[derive(Debug, Default)]
pub(crate) struct DedupIndex {
    active: HashSet<(AnimalId, StepKey)>,
    skipped: HashMap<(AnimalId, StepKey), ExperimentId>,
}

impl DedupIndex {
    pub(crate) fn from_records<'a>(
        records: impl IntoIterator<Item = &'a ExperimentRecord>,
    ) -> Self {
        let mut index = Self::default();
        for record in records {
            let key = (record.animal_id, record.step_key());
            if record.status.is_active() {
                index.active.insert(key);
            } else {
                index.skipped.insert(key, record.id);
            }
        }
        index
    }

    /// Animals that already have an active implant record (any timepoint).
    pub(crate) fn animals_with_implant(&self) -> HashSet<AnimalId> {
        self.active
            .iter()
            .filter(|(_, key)| key.experiment_type == ExperimentType::EegImplant)
            .map(|(animal_id, _)| *animal_id)
            .collect()
    }
}

/// Per-animal mutable accumulator for the EEG once-per-animal rule.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EegState {
    /// The implant exists: either an active record predates this pass, or
    /// the pass has queued one.
    pub implant_done: bool,
}

/// Writes queued during planning, applied after all timepoints are expanded.
/// Reactivations go first (they reuse existing row ids), then inserts.
#[derive(Debug, Default)]
pub(crate) struct PlannedWrites {
    pub inserts: Vec<ExperimentRecord>,
    pub reactivations: Vec<(ExperimentId, ExperimentUpdate)>,
}

impl PlannedWrites {
    pub(crate) fn total(&self) -> usize {
        self.inserts.len() + self.reactivations.len()
    }

    /// Queue one step, reconciled against the dedup index.
    /// Returns true if anything was queued.
    fn push_step(
        &mut self,
        index: &mut DedupIndex,
        animal_id: AnimalId,
        experiment_type: ExperimentType,
        age_days: i64,
        date: NaiveDate,
        notes: Option<String>,
    ) -> bool {
        let key = (animal_id, StepKey::new(experiment_type, age_days));
        if index.active.contains(&key) {
            return false;
        }
        if let Some(id) = index.skipped.remove(&key) {
            // Reactivate in place: same row id, fresh date, back to scheduled.
            self.reactivations.push((
                id,
                ExperimentUpdate {
                    scheduled_date: Some(date),
                    status: Some(ExperimentStatus::Scheduled),
                    notes: Some(notes),
                    ..Default::default()
                },
            ));
            index.active.insert(key);
            return true;
        }
        self.inserts.push(ExperimentRecord::scheduled(
            animal_id,
            experiment_type,
            age_days,
            date,
            notes,
        ));
        index.active.insert(key);
        true
    }
}

/// Expand one timepoint of the protocol for one animal.
///
/// `implant_tp_age` is the animal's designated implant timepoint (from
/// [`implant_timepoint_age`]); `eeg` carries the once-per-animal implant
/// state across timepoints. Returns the number of records queued.
pub(crate) fn plan_timepoint(
    cfg: &ProtocolConfig,
    animal_id: AnimalId,
    birth_date: NaiveDate,
    tp: &Timepoint,
    implant_tp_age: Option<i64>,
    eeg: &mut EegState,
    index: &mut DedupIndex,
    out: &mut PlannedWrites,
) -> usize {
    let implant_here = implant_tp_age == Some(tp.age_days);

    // A flagged timepoint that is not the designated implant site is
    // recording-only: its anchors must not shift behavior or derive an
    // implant date of its own.
    let anchors = if implant_here || !tp.includes_eeg_implant {
        TimelineAnchors::compute(tp.experiment_start(birth_date), tp, cfg)
    } else {
        let mut recording_only = tp.clone();
        recording_only.includes_eeg_implant = false;
        TimelineAnchors::compute(tp.experiment_start(birth_date), &recording_only, cfg)
    };

    let mut queued = 0;

    for step in &cfg.steps {
        let date = if step.experiment_type == ExperimentType::Handling {
            if tp.handling_days_before <= 0 {
                continue;
            }
            add_days(anchors.behavior_start, -tp.handling_days_before)
        } else {
            add_days(anchors.behavior_start, step.day_offset)
        };
        if out.push_step(
            index,
            animal_id,
            step.experiment_type,
            tp.age_days,
            date,
            step.notes.clone(),
        ) {
            queued += 1;
        }
    }

    // Implant surgery: once per animal, only at the designated timepoint.
    if implant_here && !eeg.implant_done {
        if let Some(implant_date) = anchors.implant_date {
            if out.push_step(
                index,
                animal_id,
                ExperimentType::EegImplant,
                tp.age_days,
                implant_date,
                Some("EEG implant surgery (one-time)".to_string()),
            ) {
                queued += 1;
            }
            // The key is now active either way.
            eeg.implant_done = true;
        }
    }

    // Recording: needs the implant to exist and this timepoint to be at or
    // past the implant timepoint's age.
    let recording_applies = tp.includes_eeg_implant
        && eeg.implant_done
        && implant_tp_age.map_or(false, |implant_age| tp.age_days >= implant_age);
    if recording_applies {
        let notes = if implant_here {
            format!(
                "EEG recording ({}d) after {}d post-surgery recovery",
                tp.eeg_recording_days, tp.eeg_recovery_days
            )
        } else {
            format!(
                "EEG recording ({}d), no surgery needed",
                tp.eeg_recording_days
            )
        };
        if out.push_step(
            index,
            animal_id,
            ExperimentType::EegRecording,
            tp.age_days,
            anchors.recording_start,
            Some(notes),
        ) {
            queued += 1;
        }
    }

    // Plasma draw at every processed timepoint, trailing the recording when
    // one applies, otherwise the last behavior day.
    let plasma_date = if recording_applies {
        anchors.plasma_date
    } else {
        anchors.plasma_without_eeg_date
    };
    if out.push_step(
        index,
        animal_id,
        ExperimentType::BloodDraw,
        tp.age_days,
        plasma_date,
        Some("Plasma collection (10:00-13:00)".to_string()),
    ) {
        queued += 1;
    }

    queued
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_core::EegImplantTiming;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn plan_one(tp: &Timepoint, all: &[Timepoint]) -> PlannedWrites {
        let cfg = ProtocolConfig::default();
        let animal_id = uuid::Uuid::now_v7();
        let mut index = DedupIndex::default();
        let mut eeg = EegState { implant_done: false };
        let mut out = PlannedWrites::default();
        plan_timepoint(
            &cfg,
            animal_id,
            d("2024-01-01"),
            tp,
            implant_timepoint_age(all),
            &mut eeg,
            &mut index,
            &mut out,
        );
        out
    }

    #[test]
    fn test_plain_timepoint_schedules_battery_and_plasma() {
        let tp = Timepoint::new("30-day", 30);
        let out = plan_one(&tp, std::slice::from_ref(&tp));
        // 12 fixed steps + blood draw, no EEG.
        assert_eq!(out.inserts.len(), 13);
        assert!(out.reactivations.is_empty());
        let types: Vec<ExperimentType> =
            out.inserts.iter().map(|r| r.experiment_type).collect();
        assert!(types.contains(&ExperimentType::Handling));
        assert!(types.contains(&ExperimentType::BloodDraw));
        assert!(!types.contains(&ExperimentType::EegImplant));
    }

    #[test]
    fn test_handling_disabled_when_zero_days() {
        let mut tp = Timepoint::new("30-day", 30);
        tp.handling_days_before = 0;
        let out = plan_one(&tp, std::slice::from_ref(&tp));
        assert!(out
            .inserts
            .iter()
            .all(|r| r.experiment_type != ExperimentType::Handling));
    }

    #[test]
    fn test_implant_timepoint_gets_implant_and_recording() {
        let tp = Timepoint::new("60-day", 60).with_eeg(EegImplantTiming::After);
        let out = plan_one(&tp, std::slice::from_ref(&tp));
        let implant = out
            .inserts
            .iter()
            .find(|r| r.experiment_type == ExperimentType::EegImplant)
            .unwrap();
        let recording = out
            .inserts
            .iter()
            .find(|r| r.experiment_type == ExperimentType::EegRecording)
            .unwrap();
        let plasma = out
            .inserts
            .iter()
            .find(|r| r.experiment_type == ExperimentType::BloodDraw)
            .unwrap();
        // birth 2024-01-01 + 60d = 2024-03-01; battery ends 03-10.
        assert_eq!(implant.scheduled_date, d("2024-03-11"));
        assert_eq!(recording.scheduled_date, d("2024-03-18"));
        assert_eq!(plasma.scheduled_date, d("2024-03-28"));
    }

    #[test]
    fn test_recording_only_timepoint_uses_baseline_gap() {
        let implant_tp = Timepoint::new("60-day", 60)
            .with_eeg(EegImplantTiming::After)
            .with_sort_order(1);
        let later_tp = Timepoint::new("120-day", 120)
            .with_eeg(EegImplantTiming::After)
            .with_sort_order(2);
        let all = vec![implant_tp.clone(), later_tp.clone()];

        let cfg = ProtocolConfig::default();
        let animal_id = uuid::Uuid::now_v7();
        let mut index = DedupIndex::default();
        let mut eeg = EegState { implant_done: false };
        let mut out = PlannedWrites::default();
        for tp in [&implant_tp, &later_tp] {
            plan_timepoint(
                &cfg,
                animal_id,
                d("2024-01-01"),
                tp,
                implant_timepoint_age(&all),
                &mut eeg,
                &mut index,
                &mut out,
            );
        }

        let implants: Vec<_> = out
            .inserts
            .iter()
            .filter(|r| r.experiment_type == ExperimentType::EegImplant)
            .collect();
        assert_eq!(implants.len(), 1, "implant is once per animal");
        assert_eq!(implants[0].timepoint_age_days, 60);

        let later_recording = out
            .inserts
            .iter()
            .find(|r| {
                r.experiment_type == ExperimentType::EegRecording && r.timepoint_age_days == 120
            })
            .unwrap();
        // 120d battery: starts 2024-04-30, ends 05-09; baseline gap 1 day.
        assert_eq!(later_recording.scheduled_date, d("2024-05-10"));
    }

    #[test]
    fn test_active_key_never_requeued() {
        let cfg = ProtocolConfig::default();
        let animal_id = uuid::Uuid::now_v7();
        let tp = Timepoint::new("30-day", 30);
        let existing = ExperimentRecord::scheduled(
            animal_id,
            ExperimentType::YMaze,
            30,
            d("2024-01-31"),
            None,
        );
        let mut index = DedupIndex::from_records([&existing]);
        let mut eeg = EegState { implant_done: false };
        let mut out = PlannedWrites::default();
        plan_timepoint(
            &cfg,
            animal_id,
            d("2024-01-01"),
            &tp,
            None,
            &mut eeg,
            &mut index,
            &mut out,
        );
        assert!(out
            .inserts
            .iter()
            .all(|r| r.experiment_type != ExperimentType::YMaze));
    }

    #[test]
    fn test_skipped_record_reactivated_not_duplicated() {
        let cfg = ProtocolConfig::default();
        let animal_id = uuid::Uuid::now_v7();
        let tp = Timepoint::new("30-day", 30);
        let mut skipped = ExperimentRecord::scheduled(
            animal_id,
            ExperimentType::Marble,
            30,
            d("2024-01-31"),
            None,
        );
        skipped.status = ExperimentStatus::Skipped;
        let skipped_id = skipped.id;

        let mut index = DedupIndex::from_records([&skipped]);
        let mut eeg = EegState { implant_done: false };
        let mut out = PlannedWrites::default();
        plan_timepoint(
            &cfg,
            animal_id,
            d("2024-01-01"),
            &tp,
            None,
            &mut eeg,
            &mut index,
            &mut out,
        );

        assert!(out
            .inserts
            .iter()
            .all(|r| r.experiment_type != ExperimentType::Marble));
        let (id, update) = out
            .reactivations
            .iter()
            .find(|(id, _)| *id == skipped_id)
            .expect("skipped marble reactivated");
        assert_eq!(*id, skipped_id);
        assert_eq!(update.status, Some(ExperimentStatus::Scheduled));
        assert_eq!(update.scheduled_date, Some(d("2024-01-31")));
    }

    #[test]
    fn test_select_timepoints_errors() {
        assert_eq!(
            select_timepoints(vec![], None).unwrap_err(),
            ScheduleError::NoTimepointsConfigured
        );
        let all = vec![Timepoint::new("30-day", 30)];
        assert_eq!(
            select_timepoints(all.clone(), Some(&[99])).unwrap_err(),
            ScheduleError::NoMatchingTimepoints
        );
        // Empty filter slice means "no restriction".
        assert_eq!(select_timepoints(all, Some(&[])).unwrap().len(), 1);
    }
}
