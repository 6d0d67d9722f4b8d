use std::collections::BTreeMap;

use crate::domain::error::ReviewError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Buy,
    Sell,
}

/// What the AI judgment boundary is asked to look at.
#[derive(Debug, Clone, Serialize)]
pub struct AiCandidate {
    pub kind: CandidateKind,
    pub symbol: String,
    /// Local pre-AI score in `[0, 1]`.
    pub score: f64,
    /// Short human-readable context for the judge.
    pub summary: String,
    pub features: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiJudgment {
    pub accept: bool,
    pub confidence: f64,
    pub reasoning: String,
}

impl AiJudgment {
    pub fn validate(&self) -> Result<(), ReviewError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ReviewError::Validation(format!(
                "AI confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Black-box classifier that accepts or rejects a candidate.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn judge(&self, candidate: &AiCandidate) -> Result<AiJudgment, ReviewError>;
}
