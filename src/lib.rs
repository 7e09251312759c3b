//! Skill-swap matching service.
//!
//! Ranks marketplace users by how well the skills they offer match a list of
//! wanted skills, using sentence embeddings and cosine similarity.

pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod matching;

pub use api::{ApiConfig, ApiServer, AppState};
pub use config::ServiceConfig;
pub use directory::{DirectoryProvider, InMemoryDirectory, UserRecord};
pub use error::{Error, Result};
pub use matching::{
    Candidate, EmbeddingService, EmbeddingServiceConfig, MatchOptions, MatchOrchestrator,
    MatchResult, SkillEncoder, SkillList,
};
