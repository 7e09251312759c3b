//! User directory adapter.
//!
//! The directory is the source of match candidates. It is an external
//! collaborator: the matching core only needs the public users and their
//! offered skills, fetched fresh for every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::matching::{deserialize_stored, Candidate, SkillList};

/// Source of public candidates.
///
/// # Example
///
/// ```rust,ignore
/// struct PostgresDirectory { pool: PgPool }
///
/// #[async_trait]
/// impl DirectoryProvider for PostgresDirectory {
///     fn name(&self) -> &str {
///         "postgres"
///     }
///
///     async fn public_candidates(&self) -> Result<Vec<Candidate>> {
///         // SELECT id, name, skills_offered FROM users WHERE is_public ORDER BY id
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// All publicly visible users, in a deterministic order.
    ///
    /// Users without offered skills are included; the orchestrator skips them.
    async fn public_candidates(&self) -> Result<Vec<Candidate>>;

    /// Check if the directory can currently serve requests.
    async fn is_available(&self) -> bool {
        true
    }
}

/// A user as stored by the marketplace.
///
/// Skill fields accept either a JSON array or the legacy comma-joined string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default, deserialize_with = "deserialize_stored")]
    pub skills_offered: SkillList,
    #[serde(default, deserialize_with = "deserialize_stored")]
    pub skills_wanted: SkillList,
}

fn default_public() -> bool {
    true
}

impl UserRecord {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.id, self.name.clone(), self.skills_offered.clone())
    }
}

/// Directory held in memory, optionally seeded from a JSON file.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<Vec<UserRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<UserRecord>) -> Self {
        Self {
            users: RwLock::new(records),
        }
    }

    /// Load a JSON array of [`UserRecord`]s.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            Error::Directory(format!("cannot read {}: {}", path.display(), e))
        })?;
        let records: Vec<UserRecord> = serde_json::from_slice(&raw).map_err(|e| {
            Error::Directory(format!("invalid user records in {}: {}", path.display(), e))
        })?;

        info!(
            users = records.len(),
            path = %path.display(),
            "Loaded user directory"
        );
        Ok(Self::from_records(records))
    }

    /// Insert a user or replace the one with the same id.
    pub async fn upsert(&self, record: UserRecord) {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == record.id) {
            Some(existing) => *existing = record,
            None => users.push(record),
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn public_candidates(&self) -> Result<Vec<Candidate>> {
        let users = self.users.read().await;
        let mut public: Vec<&UserRecord> = users.iter().filter(|u| u.is_public).collect();
        public.sort_by_key(|u| u.id);
        Ok(public.into_iter().map(UserRecord::candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, public: bool, offered: &str) -> UserRecord {
        UserRecord {
            id,
            name: format!("user-{id}"),
            email: None,
            location: None,
            availability: None,
            is_public: public,
            skills_offered: SkillList::from_legacy(offered),
            skills_wanted: SkillList::default(),
        }
    }

    #[tokio::test]
    async fn test_only_public_users_in_id_order() {
        let directory = InMemoryDirectory::from_records(vec![
            record(3, true, "cooking"),
            record(1, true, "python"),
            record(2, false, "guitar"),
        ]);

        let candidates = directory.public_candidates().await.unwrap();

        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_users_without_skills_are_still_listed() {
        let directory = InMemoryDirectory::from_records(vec![record(1, true, "")]);

        let candidates = directory.public_candidates().await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].offered_skills.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_user() {
        let directory = InMemoryDirectory::new();
        directory.upsert(record(1, true, "cooking")).await;
        directory.upsert(record(1, true, "baking, grilling")).await;

        assert_eq!(directory.len().await, 1);
        let candidates = directory.public_candidates().await.unwrap();
        assert_eq!(candidates[0].offered_skills.as_slice(), ["baking", "grilling"]);
    }

    #[tokio::test]
    async fn test_load_accepts_array_and_legacy_skills() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "name": "Amy", "skills_offered": ["Cooking", "Yoga"]},
                {"id": 2, "name": "David", "skills_offered": "Python, Data Analysis ,Excel", "is_public": true},
                {"id": 3, "name": "Hidden", "skills_offered": "Guitar", "is_public": false}
            ]"#,
        )
        .unwrap();

        let directory = InMemoryDirectory::load(&path).unwrap();
        let candidates = directory.public_candidates().await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].offered_skills.as_slice(), ["Cooking", "Yoga"]);
        assert_eq!(
            candidates[1].offered_skills.as_slice(),
            ["Python", "Data Analysis", "Excel"]
        );
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = InMemoryDirectory::load("/nonexistent/users.json").unwrap_err();
        assert!(matches!(err, Error::Directory(_)));
    }
}
