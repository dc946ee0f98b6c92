use crate::error::{AnalysisError, Result};
use crate::models::SearchHit;

/// Keeps hits whose relevance score reaches a threshold in `[0, 1]`.
/// Thresholds outside that range are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    threshold: f32,
}

impl RelevanceFilter {
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "relevance threshold {} is outside [0, 1]",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn admits(&self, hit: &SearchHit) -> bool {
        hit.score >= self.threshold
    }

    /// Order-preserving subsequence of `hits` that clears the threshold.
    pub fn apply(&self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        hits.into_iter().filter(|h| self.admits(h)).collect()
    }
}
