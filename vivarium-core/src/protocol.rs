//! Protocol step table and configuration
//!
//! The behavior battery is a fixed, ordered list of steps with day offsets
//! relative to the "behavior start" anchor. The table and its gap constants
//! live in an immutable config object injected into the anchor calculator
//! and the schedulers, so tests can substitute alternate protocols.

use crate::{EegImplantTiming, ExperimentType, Timepoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One fixed step of the behavior battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolStep {
    pub experiment_type: ExperimentType,
    /// Days after behavior start. Ignored for handling, which is pinned at
    /// `behavior_start - handling_days_before` per timepoint.
    pub day_offset: i64,
    pub notes: Option<String>,
}

impl ProtocolStep {
    fn new(experiment_type: ExperimentType, day_offset: i64, notes: &str) -> Self {
        Self {
            experiment_type,
            day_offset,
            notes: Some(notes.to_string()),
        }
    }
}

/// Immutable protocol configuration: the step table plus the gap constants
/// the anchor calculator derives dates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Ordered behavior-battery steps, handling first.
    pub steps: Vec<ProtocolStep>,
    /// Offset of the last fixed step (the stamina day).
    pub last_behavior_offset: i64,
    /// Gap between the last behavior day and a recording-only baseline start.
    pub recording_gap_after_behavior_days: i64,
    /// Gap between recording end (or last behavior day without EEG) and the
    /// plasma draw.
    pub plasma_gap_after_recording_days: i64,
}

impl Default for ProtocolConfig {
    /// The 10-day mouse behavior battery.
    fn default() -> Self {
        Self {
            steps: vec![
                ProtocolStep::new(
                    ExperimentType::Handling,
                    -5,
                    "Transport, 1hr rest, 2 min handling per day",
                ),
                ProtocolStep::new(ExperimentType::YMaze, 0, "Day 1 AM, anxiety baseline"),
                ProtocolStep::new(ExperimentType::Marble, 0, "Day 1 PM, marble burying"),
                ProtocolStep::new(ExperimentType::Ldb, 1, "Day 2 AM, light-dark box"),
                ProtocolStep::new(ExperimentType::Nesting, 1, "Day 2 PM, overnight nesting"),
                ProtocolStep::new(
                    ExperimentType::DataCollection,
                    2,
                    "Day 3, data collection and move to core",
                ),
                ProtocolStep::new(
                    ExperimentType::CoreAcclimation,
                    3,
                    "Day 4-5, 48hr core acclimation",
                ),
                ProtocolStep::new(ExperimentType::Catwalk, 5, "Day 6, CatWalk gait analysis"),
                ProtocolStep::new(ExperimentType::RotarodHab, 5, "Day 6, rotarod habituation"),
                ProtocolStep::new(
                    ExperimentType::RotarodTest1,
                    6,
                    "Day 7, rotarod testing (acceleration)",
                ),
                ProtocolStep::new(
                    ExperimentType::RotarodTest2,
                    7,
                    "Day 8, rotarod testing (acceleration)",
                ),
                ProtocolStep::new(
                    ExperimentType::Stamina,
                    9,
                    "Day 10, stamina test (10 RPM / 60m cap)",
                ),
            ],
            last_behavior_offset: 9,
            recording_gap_after_behavior_days: 1,
            plasma_gap_after_recording_days: 7,
        }
    }
}

impl ProtocolConfig {
    /// Canonical offset map for one timepoint, keyed by experiment type,
    /// all offsets relative to behavior start.
    ///
    /// Extends the static table with the per-timepoint handling offset and
    /// the derived EEG/plasma offsets, so the rescheduler can reason about
    /// relative spacing without absolute dates.
    pub fn offset_map(&self, tp: &Timepoint) -> HashMap<ExperimentType, i64> {
        let mut offsets: HashMap<ExperimentType, i64> = self
            .steps
            .iter()
            .map(|s| (s.experiment_type, s.day_offset))
            .collect();
        offsets.insert(ExperimentType::Handling, -tp.handling_days_before);

        if tp.includes_eeg_implant {
            let implant_offset = match tp.eeg_implant_timing {
                // Implant at experiment start; behavior begins after recovery.
                EegImplantTiming::Before => -tp.eeg_recovery_days,
                // Implant the day after the last behavior day.
                EegImplantTiming::After => self.last_behavior_offset + 1,
            };
            let recording_offset = implant_offset + tp.eeg_recovery_days;
            offsets.insert(ExperimentType::EegImplant, implant_offset);
            offsets.insert(ExperimentType::EegRecording, recording_offset);
            offsets.insert(
                ExperimentType::BloodDraw,
                recording_offset + tp.eeg_recording_days + self.plasma_gap_after_recording_days,
            );
        } else {
            offsets.insert(
                ExperimentType::BloodDraw,
                self.last_behavior_offset + self.plasma_gap_after_recording_days,
            );
        }

        offsets
    }
}
