//! Semantic skill matching.
//!
//! Ranks candidate users against a list of wanted skills:
//! - FastEmbed for embedding generation (ONNX-based, lightweight)
//! - Max pairwise cosine similarity as the candidate score
//! - Threshold, stable sort and truncation in the orchestrator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Wanted skills   │────▶│ EmbeddingService│◀──── skill_match_model.json
//! │ Candidate skills│     │   (FastEmbed)   │      (loaded once per process)
//! └─────────────────┘     └────────┬────────┘
//!                                  │
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ EmbeddingMatrix │
//!                         │   k × [f32;384] │
//!                         └────────┬────────┘
//!                                  │
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ max cosine(q,c) │
//!                         └────────┬────────┘
//!                                  │
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ MatchOrchestrator│
//!                         │ filter/sort/top-N│
//!                         └─────────────────┘
//! ```

pub mod embedding;
mod orchestrator;
mod similarity;
mod skills;

pub use embedding::{
    Embedding, EmbeddingMatrix, EmbeddingService, EmbeddingServiceConfig, FastEmbedLoader,
    ModelArtifact, ModelLoader, ModelOrigin, SkillEncoder, TextModel, ARTIFACT_FILE,
};
pub use orchestrator::{Candidate, MatchOptions, MatchOrchestrator, MatchResult};
pub use similarity::{cosine_similarity, max_pairwise_similarity};
pub use skills::{deserialize_stored, SkillList};

/// Default embedding model (all-MiniLM-L6-v2 - 384 dimensions, good balance of speed/quality)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Embedding dimension for the default model
pub const EMBEDDING_DIM: usize = 384;

/// Default minimum score for a candidate to be returned.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default maximum number of results per match call.
pub const DEFAULT_LIMIT: usize = 10;
