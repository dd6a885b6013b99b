//! Core record and journal type definitions.
//!
//! Defines [`Salience`] (how central an entity is), the entity/observation/relation
//! records of the record store, and the journal entry records.

use serde::{Deserialize, Serialize};

/// Importance tier of an entity. Drives what the context block treats as core knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Salience {
    /// Always surfaced in the context block.
    Foundational,
    /// Current, regularly referenced knowledge.
    #[default]
    Active,
    Background,
    Archive,
}

impl Salience {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foundational => "foundational",
            Self::Active => "active",
            Self::Background => "background",
            Self::Archive => "archive",
        }
    }
}

impl std::fmt::Display for Salience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Salience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foundational" => Ok(Self::Foundational),
            "active" => Ok(Self::Active),
            "background" => Ok(Self::Background),
            "archive" => Ok(Self::Archive),
            _ => Err(format!(
                "unknown salience: {s} (expected foundational, active, background, or archive)"
            )),
        }
    }
}

impl rusqlite::types::FromSql for Salience {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
    }
}

/// Whether an upsert created a new entity or appended to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAction {
    Created,
    Updated,
}

/// A single timestamped fact about an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub content: String,
    /// RFC 3339 UTC timestamp.
    pub added_at: String,
}

/// A fully hydrated entity, observations newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub namespace: String,
    pub salience: Salience,
    pub created_at: String,
    pub updated_at: String,
    pub observations: Vec<Observation>,
}

/// Listing row: an entity with its most recent observation texts.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub salience: Salience,
    pub updated_at: String,
    pub recent_observations: Vec<String>,
}

/// Metadata fields to change on an entity. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub salience: Option<Salience>,
}

impl EntityUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.entity_type.is_none() && self.salience.is_none()
    }
}

/// A typed edge between two entity names. Endpoints are not checked against
/// the entities table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    pub from_entity: String,
    pub relation_type: String,
    pub to_entity: String,
    pub namespace: String,
    pub created_at: String,
}

/// Fields for a new (or rewritten) journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub decisions: String,
    #[serde(default)]
    pub open_loops: String,
    #[serde(default)]
    pub artifacts: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

fn default_importance() -> i64 {
    1
}

impl NewEntry {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            decisions: String::new(),
            open_loops: String::new(),
            artifacts: serde_json::Map::new(),
            tags: Vec::new(),
            importance: default_importance(),
            session_id: None,
            thread_id: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }
}

/// A stored journal entry with artifacts and tags decoded.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub created_at: String,
    pub session_id: Option<String>,
    pub thread_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub decisions: String,
    pub open_loops: String,
    pub artifacts: serde_json::Map<String, serde_json::Value>,
    pub tags: Vec<String>,
    pub importance: i64,
}

/// Current UTC time as fixed-width RFC 3339 (microseconds, `Z` suffix), so
/// timestamps sort lexicographically in SQL.
pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
