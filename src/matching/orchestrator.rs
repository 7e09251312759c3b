//! Match orchestration: encode, score, threshold, rank.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::embedding::SkillEncoder;
use super::similarity::max_pairwise_similarity;
use super::{SkillList, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use crate::error::{Error, Result};

/// A user eligible for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub offered_skills: SkillList,
}

impl Candidate {
    pub fn new(id: i64, name: impl Into<String>, offered_skills: SkillList) -> Self {
        Self {
            id,
            name: name.into(),
            offered_skills,
        }
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub candidate_id: i64,
    pub name: String,
    pub offered_skills: SkillList,
    /// Best cosine similarity between any wanted and any offered skill.
    pub score: f32,
}

/// Ranking parameters for one match call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    /// Candidates scoring below this are dropped.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
    /// Floor negative similarities to 0 before thresholding.
    pub floor_negative_scores: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            floor_negative_scores: true,
        }
    }
}

/// Ranks candidates against a list of wanted skills.
///
/// Stateless apart from the shared encoder; safe to call concurrently.
#[derive(Clone)]
pub struct MatchOrchestrator {
    encoder: Arc<dyn SkillEncoder>,
}

impl MatchOrchestrator {
    pub fn new(encoder: Arc<dyn SkillEncoder>) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &Arc<dyn SkillEncoder> {
        &self.encoder
    }

    /// Score `candidates` against `query_skills`.
    ///
    /// The result holds at most `options.limit` entries, every score is at
    /// least `options.threshold`, and scores are non-increasing with equal
    /// scores kept in candidate input order. Candidates without offered skills
    /// are skipped entirely. Any encoder failure fails the whole call.
    pub fn match_candidates(
        &self,
        query_skills: &SkillList,
        candidates: &[Candidate],
        options: &MatchOptions,
    ) -> Result<Vec<MatchResult>> {
        if query_skills.is_empty() {
            return Err(Error::InvalidQuery(
                "at least one interested skill is required".to_string(),
            ));
        }

        let query = self.encoder.encode(query_skills.as_slice())?;

        let mut skipped = 0usize;
        let mut results = Vec::new();
        for candidate in candidates {
            if candidate.offered_skills.is_empty() {
                skipped += 1;
                continue;
            }

            let offered = self.encoder.encode(candidate.offered_skills.as_slice())?;
            let Some(mut score) = max_pairwise_similarity(&query, &offered) else {
                continue;
            };
            if options.floor_negative_scores {
                score = score.max(0.0);
            }

            if score >= options.threshold {
                results.push(MatchResult {
                    candidate_id: candidate.id,
                    name: candidate.name.clone(),
                    offered_skills: candidate.offered_skills.clone(),
                    score,
                });
            }
        }

        let retained = results.len();
        // `sort_by` is stable, so ties keep input order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(options.limit);

        debug!(
            query_skills = query_skills.len(),
            candidates = candidates.len(),
            skipped,
            retained,
            returned = results.len(),
            threshold = options.threshold,
            model = self.encoder.model_name(),
            "Ranked candidates"
        );

        Ok(results)
    }
}
