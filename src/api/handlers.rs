//! HTTP handlers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::config::MAX_SCORE_PRECISION;
use crate::matching::{MatchResult, SkillEncoder, SkillList};

/// Body of `POST /match`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchRequest {
    pub interested_skills: SkillList,
}

/// One entry of the `POST /match` response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchedUser {
    pub id: i64,
    pub name: String,
    pub skills_offered: SkillList,
    pub score: f64,
}

impl MatchedUser {
    /// Convert a match result, rounding the score to `precision` decimals.
    pub fn from_result(result: MatchResult, precision: u32) -> Self {
        Self {
            id: result.candidate_id,
            name: result.name,
            skills_offered: result.offered_skills,
            score: round_score(result.score, precision),
        }
    }
}

fn round_score(score: f32, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_SCORE_PRECISION) as i32);
    (score as f64 * factor).round() / factor
}

/// Health payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
    pub model: String,
    pub model_loaded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.directory.is_available().await {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        model: state.embedding.model_name().to_string(),
        model_loaded: state.embedding.is_loaded(),
    })
}

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the Skill Swap API!".to_string(),
    })
}

pub async fn match_test() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Skill match endpoint is working!".to_string(),
    })
}

/// Rank public users against the requested skills.
///
/// Encoding is CPU-bound, so the ranking runs on the blocking pool under the
/// configured request timeout.
pub async fn skill_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<Vec<MatchedUser>>, ApiError> {
    let query = request.interested_skills;
    if query.is_empty() {
        return Err(ApiError::InvalidQuery(
            "interested_skills must contain at least one skill".to_string(),
        ));
    }

    let candidates = state.directory.public_candidates().await?;
    let candidate_count = candidates.len();

    let orchestrator = state.orchestrator.clone();
    let options = state.match_options;
    let task = tokio::task::spawn_blocking(move || {
        orchestrator.match_candidates(&query, &candidates, &options)
    });

    let results = tokio::time::timeout(state.request_timeout, task)
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout.as_secs()))?
        .map_err(|e| ApiError::Internal(format!("matching task failed: {}", e)))??;

    info!(
        candidates = candidate_count,
        matches = results.len(),
        "Skill match completed"
    );

    Ok(Json(
        results
            .into_iter()
            .map(|r| MatchedUser::from_result(r, state.score_precision))
            .collect(),
    ))
}
