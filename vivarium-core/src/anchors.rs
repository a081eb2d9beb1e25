//! Timeline anchor calculator
//!
//! Pure date arithmetic mapping a timepoint's start date and EEG
//! configuration to the named anchor dates the schedulers place records on.

use crate::entities::add_days;
use crate::{EegImplantTiming, ProtocolConfig, Timepoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named anchor dates for one timepoint of one animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineAnchors {
    /// `birth_date + timepoint.age_days`.
    pub experiment_start: NaiveDate,
    /// First day of the behavior battery. Pushed back by the recovery window
    /// when the implant happens before behavior.
    pub behavior_start: NaiveDate,
    /// The stamina day.
    pub last_behavior_date: NaiveDate,
    /// Implant surgery date, when this timepoint carries the implant.
    pub implant_date: Option<NaiveDate>,
    /// Recording start for a timepoint with no implant of its own
    /// (recording-only follow-ups after an earlier implant).
    pub baseline_recording_start: NaiveDate,
    /// Recording start: `implant + recovery` when this timepoint implants,
    /// otherwise the baseline start.
    pub recording_start: NaiveDate,
    pub recording_end: NaiveDate,
    /// Plasma draw when EEG recording applies at this timepoint.
    pub plasma_date: NaiveDate,
    /// Plasma draw when it does not.
    pub plasma_without_eeg_date: NaiveDate,
}

impl TimelineAnchors {
    /// Compute all anchors for `experiment_start` under the timepoint's EEG
    /// configuration. Callers pick which plasma date applies.
    pub fn compute(experiment_start: NaiveDate, tp: &Timepoint, cfg: &ProtocolConfig) -> Self {
        let (behavior_start, mut implant_date) =
            if tp.includes_eeg_implant && tp.eeg_implant_timing == EegImplantTiming::Before {
                // Implant first, recover, then test.
                (
                    add_days(experiment_start, tp.eeg_recovery_days),
                    Some(experiment_start),
                )
            } else {
                (experiment_start, None)
            };

        let last_behavior_date = add_days(behavior_start, cfg.last_behavior_offset);

        if tp.includes_eeg_implant && tp.eeg_implant_timing == EegImplantTiming::After {
            implant_date = Some(add_days(last_behavior_date, 1));
        }

        let baseline_recording_start =
            add_days(last_behavior_date, cfg.recording_gap_after_behavior_days);
        let recording_start = match implant_date {
            Some(implant) => add_days(implant, tp.eeg_recovery_days),
            None => baseline_recording_start,
        };
        let recording_end = add_days(recording_start, tp.eeg_recording_days);

        Self {
            experiment_start,
            behavior_start,
            last_behavior_date,
            implant_date,
            baseline_recording_start,
            recording_start,
            recording_end,
            plasma_date: add_days(recording_end, cfg.plasma_gap_after_recording_days),
            plasma_without_eeg_date: add_days(
                last_behavior_date,
                cfg.plasma_gap_after_recording_days,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timepoint;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn anchors_for(tp: &Timepoint) -> TimelineAnchors {
        let cfg = ProtocolConfig::default();
        TimelineAnchors::compute(tp.experiment_start(d("2024-01-01")), tp, &cfg)
    }

    #[test]
    fn test_anchors_implant_after() {
        let tp = Timepoint::new("30-day", 30).with_eeg(EegImplantTiming::After);
        let a = anchors_for(&tp);
        assert_eq!(a.behavior_start, d("2024-01-31"));
        assert_eq!(a.last_behavior_date, d("2024-02-09"));
        assert_eq!(a.implant_date, Some(d("2024-02-10")));
        assert_eq!(a.recording_start, d("2024-02-17"));
        assert_eq!(a.recording_end, d("2024-02-20"));
        assert_eq!(a.plasma_date, d("2024-02-27"));
    }

    #[test]
    fn test_anchors_implant_before() {
        let tp = Timepoint::new("30-day", 30).with_eeg(EegImplantTiming::Before);
        let a = anchors_for(&tp);
        assert_eq!(a.implant_date, Some(d("2024-01-31")));
        assert_eq!(a.behavior_start, d("2024-02-07"));
        assert_eq!(a.last_behavior_date, d("2024-02-16"));
        // recording_start = implant_date + eeg_recovery_days
        assert_eq!(a.recording_start, d("2024-02-07"));
        assert_eq!(a.recording_end, d("2024-02-10"));
        assert_eq!(a.plasma_date, d("2024-02-17"));
    }

    #[test]
    fn test_anchors_no_eeg() {
        let tp = Timepoint::new("30-day", 30);
        let a = anchors_for(&tp);
        assert_eq!(a.behavior_start, d("2024-01-31"));
        assert_eq!(a.implant_date, None);
        assert_eq!(a.recording_start, a.baseline_recording_start);
        assert_eq!(a.baseline_recording_start, d("2024-02-10"));
        assert_eq!(a.plasma_without_eeg_date, d("2024-02-16"));
    }

    #[test]
    fn test_recording_only_baseline_gap() {
        let cfg = ProtocolConfig::default();
        let tp = Timepoint::new("120-day", 120);
        let a = TimelineAnchors::compute(tp.experiment_start(d("2024-01-01")), &tp, &cfg);
        assert_eq!(
            a.baseline_recording_start,
            add_days(a.last_behavior_date, cfg.recording_gap_after_behavior_days)
        );
    }
}
