//! Skill label lists.

use serde::{Deserialize, Deserializer, Serialize};

/// Separator of the legacy comma-joined storage form.
const LEGACY_SEPARATOR: char = ',';

/// Ordered list of free-text skill labels.
///
/// Labels are trimmed and blank labels dropped on construction. Duplicates and
/// order are kept as given. On the wire it is always a JSON array; stored user
/// records may also carry the comma-joined form, see [`deserialize_stored`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SkillList(Vec<String>);

/// Deserialize a stored skill field: a JSON array or a legacy comma-joined string.
pub fn deserialize_stored<'de, D>(deserializer: D) -> Result<SkillList, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Many(Vec<String>),
        Legacy(String),
    }

    Ok(match Stored::deserialize(deserializer)? {
        Stored::Many(labels) => SkillList::new(labels),
        Stored::Legacy(raw) => SkillList::from_legacy(&raw),
    })
}

impl SkillList {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels.into_iter().collect()
    }

    /// Parse the comma-joined storage form (`"cooking, baking"`).
    ///
    /// Skills containing a comma cannot be represented in this form.
    pub fn from_legacy(raw: &str) -> Self {
        raw.split(LEGACY_SEPARATOR).collect()
    }

    /// Comma-joined export form.
    pub fn to_legacy(&self) -> String {
        self.0.join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for SkillList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SkillList(
            iter.into_iter()
                .map(|label| label.as_ref().trim().to_string())
                .filter(|label| !label.is_empty())
                .collect(),
        )
    }
}

impl From<Vec<String>> for SkillList {
    fn from(labels: Vec<String>) -> Self {
        SkillList::new(labels)
    }
}

impl From<SkillList> for Vec<String> {
    fn from(list: SkillList) -> Self {
        list.0
    }
}

impl<'a> IntoIterator for &'a SkillList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_legacy_splits_and_trims() {
        let list = SkillList::from_legacy("cooking,  baking , guitar");
        assert_eq!(list.as_slice(), ["cooking", "baking", "guitar"]);
    }

    #[test]
    fn test_from_legacy_drops_blank_pieces() {
        let list = SkillList::from_legacy(" , cooking,,");
        assert_eq!(list.as_slice(), ["cooking"]);
        assert!(SkillList::from_legacy("").is_empty());
    }

    #[test]
    fn test_duplicates_and_order_are_kept() {
        let list = SkillList::new(["rust", "go", "rust"]);
        assert_eq!(list.as_slice(), ["rust", "go", "rust"]);
    }

    #[test]
    fn test_to_legacy_joins_with_comma_space() {
        let list = SkillList::new(["cooking", "baking"]);
        assert_eq!(list.to_legacy(), "cooking, baking");
        assert_eq!(SkillList::from_legacy(&list.to_legacy()), list);
    }

    #[test]
    fn test_deserializes_array_and_trims() {
        let list: SkillList = serde_json::from_str(r#"["python", " sql ", ""]"#).unwrap();
        assert_eq!(list.as_slice(), ["python", "sql"]);
    }

    #[test]
    fn test_bare_string_is_not_a_skill_list() {
        let parsed = serde_json::from_str::<SkillList>(r#""cooking, baking""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_stored_field_accepts_legacy_string() {
        #[derive(Deserialize)]
        struct Stored {
            #[serde(deserialize_with = "deserialize_stored")]
            skills: SkillList,
        }

        let from_array: Stored = serde_json::from_str(r#"{"skills": ["python", "sql"]}"#).unwrap();
        let from_string: Stored = serde_json::from_str(r#"{"skills": "python, sql"}"#).unwrap();
        assert_eq!(from_array.skills, from_string.skills);
        assert_eq!(from_string.skills.as_slice(), ["python", "sql"]);
    }

    #[test]
    fn test_serializes_as_array() {
        let list = SkillList::from_legacy("python, sql");
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["python","sql"]"#);
    }
}
