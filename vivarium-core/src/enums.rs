//! Enum types for colony entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Lifecycle status of an animal. Only `Active` animals are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalStatus {
    Active,
    Sacrificed,
    Transferred,
    Deceased,
    Retired,
}

/// Status of a single experiment record.
///
/// Records are created `Scheduled`. Operators move them through
/// `InProgress`/`Completed`/`Skipped`; `Skipped` is the only state the
/// scheduler may overwrite in place (reactivation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Skipped,
}

impl ExperimentStatus {
    /// True for records the grace-period rescheduler is allowed to move.
    pub fn is_unfinished(self) -> bool {
        matches!(
            self,
            ExperimentStatus::Pending | ExperimentStatus::Scheduled | ExperimentStatus::InProgress
        )
    }

    /// True for records that count toward the at-most-one-active-key invariant.
    pub fn is_active(self) -> bool {
        self != ExperimentStatus::Skipped
    }
}

/// Experiment type: the fixed behavior-battery steps plus the three
/// dynamically scheduled types (implant, recording, plasma draw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentType {
    Handling,
    YMaze,
    Marble,
    Ldb,
    Nesting,
    DataCollection,
    CoreAcclimation,
    Catwalk,
    RotarodHab,
    RotarodTest1,
    RotarodTest2,
    Stamina,
    EegImplant,
    EegRecording,
    BloodDraw,
}

/// When the EEG implant surgery happens relative to the behavior battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EegImplantTiming {
    /// Implant at experiment start, recover, then run the battery.
    Before,
    /// Run the battery first, implant the day after the last behavior day.
    After,
}

impl Default for EegImplantTiming {
    fn default() -> Self {
        EegImplantTiming::After
    }
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

impl fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AnimalStatus::Active => "active",
            AnimalStatus::Sacrificed => "sacrificed",
            AnimalStatus::Transferred => "transferred",
            AnimalStatus::Deceased => "deceased",
            AnimalStatus::Retired => "retired",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for AnimalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "active" => Ok(AnimalStatus::Active),
            "sacrificed" => Ok(AnimalStatus::Sacrificed),
            "transferred" => Ok(AnimalStatus::Transferred),
            "deceased" => Ok(AnimalStatus::Deceased),
            "retired" => Ok(AnimalStatus::Retired),
            _ => Err(format!("Invalid AnimalStatus: {}", s)),
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::Scheduled => "scheduled",
            ExperimentStatus::InProgress => "in_progress",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Skipped => "skipped",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ExperimentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "pending" => Ok(ExperimentStatus::Pending),
            "scheduled" => Ok(ExperimentStatus::Scheduled),
            "inprogress" => Ok(ExperimentStatus::InProgress),
            "completed" | "complete" => Ok(ExperimentStatus::Completed),
            "skipped" | "skip" => Ok(ExperimentStatus::Skipped),
            _ => Err(format!("Invalid ExperimentStatus: {}", s)),
        }
    }
}

impl fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ExperimentType::Handling => "handling",
            ExperimentType::YMaze => "y_maze",
            ExperimentType::Marble => "marble",
            ExperimentType::Ldb => "ldb",
            ExperimentType::Nesting => "nesting",
            ExperimentType::DataCollection => "data_collection",
            ExperimentType::CoreAcclimation => "core_acclimation",
            ExperimentType::Catwalk => "catwalk",
            ExperimentType::RotarodHab => "rotarod_hab",
            ExperimentType::RotarodTest1 => "rotarod_test1",
            ExperimentType::RotarodTest2 => "rotarod_test2",
            ExperimentType::Stamina => "stamina",
            ExperimentType::EegImplant => "eeg_implant",
            ExperimentType::EegRecording => "eeg_recording",
            ExperimentType::BloodDraw => "blood_draw",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ExperimentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "handling" => Ok(ExperimentType::Handling),
            "ymaze" => Ok(ExperimentType::YMaze),
            "marble" => Ok(ExperimentType::Marble),
            "ldb" | "lightdarkbox" => Ok(ExperimentType::Ldb),
            "nesting" => Ok(ExperimentType::Nesting),
            "datacollection" => Ok(ExperimentType::DataCollection),
            "coreacclimation" => Ok(ExperimentType::CoreAcclimation),
            "catwalk" => Ok(ExperimentType::Catwalk),
            "rotarodhab" => Ok(ExperimentType::RotarodHab),
            "rotarodtest1" => Ok(ExperimentType::RotarodTest1),
            "rotarodtest2" => Ok(ExperimentType::RotarodTest2),
            "stamina" => Ok(ExperimentType::Stamina),
            "eegimplant" => Ok(ExperimentType::EegImplant),
            "eegrecording" => Ok(ExperimentType::EegRecording),
            "blooddraw" => Ok(ExperimentType::BloodDraw),
            _ => Err(format!("Invalid ExperimentType: {}", s)),
        }
    }
}

impl fmt::Display for EegImplantTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EegImplantTiming::Before => "before",
            EegImplantTiming::After => "after",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EegImplantTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "before" => Ok(EegImplantTiming::Before),
            "after" => Ok(EegImplantTiming::After),
            _ => Err(format!("Invalid EegImplantTiming: {}", s)),
        }
    }
}
