use crate::domain::error::ReviewError;
use crate::domain::ports::ai_provider::{AiCandidate, AiJudgment, AiProvider, CandidateKind};
use async_trait::async_trait;

/// Deterministic local judge used when no model provider is configured.
///
/// Accepts a candidate when its local score clears the threshold for its
/// kind, and reports a confidence derived from that score.
pub struct HeuristicJudge {
    buy_threshold: f64,
    sell_threshold: f64,
}

impl HeuristicJudge {
    pub fn new(buy_threshold: f64, sell_threshold: f64) -> Self {
        Self {
            buy_threshold,
            sell_threshold,
        }
    }
}

impl Default for HeuristicJudge {
    fn default() -> Self {
        Self::new(0.6, 0.5)
    }
}

#[async_trait]
impl AiProvider for HeuristicJudge {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn judge(&self, candidate: &AiCandidate) -> Result<AiJudgment, ReviewError> {
        let score = if candidate.score.is_finite() {
            candidate.score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let threshold = match candidate.kind {
            CandidateKind::Buy => self.buy_threshold,
            CandidateKind::Sell => self.sell_threshold,
        };

        // Rescale so a score at the threshold maps to 0.5 and 1.0 stays 1.0.
        let confidence = if score >= threshold && threshold < 1.0 {
            0.5 + 0.5 * (score - threshold) / (1.0 - threshold)
        } else {
            score * 0.5
        };
        let accept = score >= threshold;
        let reasoning = format!(
            "{} local score {:.2} against threshold {:.2}: {}",
            if accept { "Accepted" } else { "Rejected" },
            score,
            threshold,
            candidate.summary
        );
        Ok(AiJudgment {
            accept,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn candidate(kind: CandidateKind, score: f64) -> AiCandidate {
        AiCandidate {
            kind,
            symbol: "ETHUSDT".into(),
            score,
            summary: "test".into(),
            features: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_threshold_per_kind() {
        let judge = HeuristicJudge::default();
        assert!(!judge.judge(&candidate(CandidateKind::Buy, 0.55)).await.unwrap().accept);
        assert!(judge.judge(&candidate(CandidateKind::Sell, 0.55)).await.unwrap().accept);
    }

    #[tokio::test]
    async fn test_confidence_is_monotone_and_bounded() {
        let judge = HeuristicJudge::default();
        let mut last = -1.0;
        for i in 0..=20 {
            let j = judge
                .judge(&candidate(CandidateKind::Buy, i as f64 / 20.0))
                .await
                .unwrap();
            assert!(j.validate().is_ok());
            assert!(j.confidence >= last);
            last = j.confidence;
        }
        assert!((last - 1.0).abs() < 1e-9);
    }
}
