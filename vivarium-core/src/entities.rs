//! Core entity structures

use crate::{
    AnimalId, AnimalStatus, CohortId, EegImplantTiming, ExperimentId, ExperimentStatus,
    ExperimentType, ResultId, TimepointId, new_entity_id,
};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A named milestone in the protocol template.
///
/// Identified operationally by `age_days` (nominal age in days since birth at
/// which the behavior battery begins), NOT by `id`: experiment records join to
/// their timepoint through `timepoint_age_days`, so editing `age_days` orphans
/// existing records unless the edit cascade runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timepoint {
    pub id: TimepointId,
    pub name: String,
    /// Nominal age (days since birth) at which the behavior battery begins.
    pub age_days: i64,
    /// Handling runs this many days before behavior start; `<= 0` disables it.
    pub handling_days_before: i64,
    /// Days past `age_days` during which outstanding work may still run.
    pub grace_period_days: i64,
    pub includes_eeg_implant: bool,
    pub eeg_implant_timing: EegImplantTiming,
    pub eeg_recovery_days: i64,
    pub eeg_recording_days: i64,
    pub sort_order: i32,
    pub notes: Option<String>,
}

impl Timepoint {
    /// Create a timepoint with the protocol's default knobs.
    pub fn new(name: impl Into<String>, age_days: i64) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            age_days,
            handling_days_before: 5,
            grace_period_days: 30,
            includes_eeg_implant: false,
            eeg_implant_timing: EegImplantTiming::default(),
            eeg_recovery_days: 7,
            eeg_recording_days: 3,
            sort_order: 0,
            notes: None,
        }
    }

    /// Mark this timepoint as an EEG timepoint (implant/recording applies).
    pub fn with_eeg(mut self, timing: EegImplantTiming) -> Self {
        self.includes_eeg_implant = true;
        self.eeg_implant_timing = timing;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// The day this timepoint's protocol starts for an animal born on `birth_date`.
    pub fn experiment_start(&self, birth_date: NaiveDate) -> NaiveDate {
        add_days(birth_date, self.age_days)
    }
}

/// A cohort of animals, usually one litter, sharing a birth date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    pub name: String,
    /// Shared birth date; animals without their own birth date fall back here.
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Cohort {
    pub fn new(name: impl Into<String>, birth_date: Option<NaiveDate>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            birth_date,
            notes: None,
        }
    }
}

/// A single animal. Only `birth_date` and `status` matter to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub name: String,
    pub cohort_id: Option<CohortId>,
    pub birth_date: Option<NaiveDate>,
    pub status: AnimalStatus,
}

impl Animal {
    pub fn new(name: impl Into<String>, cohort_id: Option<CohortId>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            cohort_id,
            birth_date: None,
            status: AnimalStatus::Active,
        }
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }
}

/// Natural key for experiment deduplication within one animal.
///
/// At most one record per key may be in a non-skipped state at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepKey {
    pub experiment_type: ExperimentType,
    pub timepoint_age_days: i64,
}

impl StepKey {
    pub fn new(experiment_type: ExperimentType, timepoint_age_days: i64) -> Self {
        Self {
            experiment_type,
            timepoint_age_days,
        }
    }
}

/// One scheduled experiment for one animal at one timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: ExperimentId,
    pub animal_id: AnimalId,
    pub experiment_type: ExperimentType,
    /// Joins back to a `Timepoint` by its `age_days` at creation time.
    pub timepoint_age_days: i64,
    pub scheduled_date: NaiveDate,
    pub completed_date: Option<NaiveDate>,
    pub status: ExperimentStatus,
    pub notes: Option<String>,
}

impl ExperimentRecord {
    /// Create a freshly scheduled record.
    pub fn scheduled(
        animal_id: AnimalId,
        experiment_type: ExperimentType,
        timepoint_age_days: i64,
        scheduled_date: NaiveDate,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: new_entity_id(),
            animal_id,
            experiment_type,
            timepoint_age_days,
            scheduled_date,
            completed_date: None,
            status: ExperimentStatus::Scheduled,
            notes,
        }
    }

    pub fn step_key(&self) -> StepKey {
        StepKey::new(self.experiment_type, self.timepoint_age_days)
    }
}

/// A measured result row, keyed to its timepoint by `timepoint_age_days`
/// the same way experiment records are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyResult {
    pub id: ResultId,
    pub animal_id: AnimalId,
    pub experiment_type: ExperimentType,
    pub timepoint_age_days: i64,
    pub measure: String,
    pub value: serde_json::Value,
    pub recorded_date: Option<NaiveDate>,
}

/// Signed day offset on a `NaiveDate`.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date + Days::new(days as u64)
    } else {
        date - Days::new((-days) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_days_signed() {
        assert_eq!(add_days(d("2024-01-31"), 1), d("2024-02-01"));
        assert_eq!(add_days(d("2024-01-31"), -5), d("2024-01-26"));
        assert_eq!(add_days(d("2024-01-31"), 0), d("2024-01-31"));
    }

    #[test]
    fn test_experiment_start() {
        let tp = Timepoint::new("30-day", 30);
        assert_eq!(tp.experiment_start(d("2024-01-01")), d("2024-01-31"));
    }

    #[test]
    fn test_step_key_equality() {
        let a = StepKey::new(ExperimentType::YMaze, 30);
        let b = StepKey::new(ExperimentType::YMaze, 30);
        let c = StepKey::new(ExperimentType::YMaze, 60);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
