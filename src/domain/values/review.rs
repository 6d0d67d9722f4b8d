use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What started a review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Scheduled,
    Manual,
    Triggered,
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewType::Scheduled => write!(f, "scheduled"),
            ReviewType::Manual => write!(f, "manual"),
            ReviewType::Triggered => write!(f, "triggered"),
        }
    }
}

impl FromStr for ReviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(ReviewType::Scheduled),
            "manual" => Ok(ReviewType::Manual),
            "triggered" => Ok(ReviewType::Triggered),
            _ => Err(format!("Unknown review type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Started => write!(f, "started"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "started" => Ok(RunStatus::Started),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {s}")),
        }
    }
}

/// Phases of a review run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    Discovery,
    Filtering,
    AiAnalysis,
    Storing,
    Completed,
}

impl ReviewPhase {
    pub const ALL: [ReviewPhase; 5] = [
        ReviewPhase::Discovery,
        ReviewPhase::Filtering,
        ReviewPhase::AiAnalysis,
        ReviewPhase::Storing,
        ReviewPhase::Completed,
    ];
}

impl fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewPhase::Discovery => write!(f, "discovery"),
            ReviewPhase::Filtering => write!(f, "filtering"),
            ReviewPhase::AiAnalysis => write!(f, "ai_analysis"),
            ReviewPhase::Storing => write!(f, "storing"),
            ReviewPhase::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ReviewPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(ReviewPhase::Discovery),
            "filtering" => Ok(ReviewPhase::Filtering),
            "ai_analysis" => Ok(ReviewPhase::AiAnalysis),
            "storing" => Ok(ReviewPhase::Storing),
            "completed" => Ok(ReviewPhase::Completed),
            _ => Err(format!("Unknown review phase: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trips_through_display() {
        for phase in ReviewPhase::ALL {
            assert_eq!(phase.to_string().parse::<ReviewPhase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_phase_ordering() {
        assert!(ReviewPhase::Discovery < ReviewPhase::Filtering);
        assert!(ReviewPhase::Storing < ReviewPhase::Completed);
    }
}
