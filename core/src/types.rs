//! Domain types for the recommendation API.
//!
//! # Design
//! The upstream API is loosely typed. Roster entries are read leniently
//! (numeric ids are accepted, a missing name falls back to the id) and items
//! stay opaque JSON values with missing-key tolerant accessors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user known to the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
}

impl RosterEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Read one roster element. Returns `None` when the element has no
    /// usable `id`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = match value.get("id")? {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        Some(Self { id, name })
    }
}

/// Which per-user list an entity tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Recommendations,
    Recent,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Recommendations, ListKind::Recent];

    /// Attribute key the items are published under, also the payload key
    /// the API uses for the list.
    pub fn key(&self) -> &'static str {
        match self {
            ListKind::Recommendations => "recommendations",
            ListKind::Recent => "recent",
        }
    }

    /// Title-cased label used in entity display names.
    pub fn label(&self) -> &'static str {
        match self {
            ListKind::Recommendations => "Recommendations",
            ListKind::Recent => "Recent",
        }
    }

    /// Endpoint path for `user_id`, with the id percent-encoded as a single
    /// path segment.
    pub fn path(&self, user_id: &str) -> String {
        let segment = urlencoding::encode(user_id);
        match self {
            ListKind::Recommendations => format!("/api/recommendations/{segment}"),
            ListKind::Recent => format!("/api/recent/{segment}"),
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One entry of a recommendation or recently-watched list.
///
/// Usually a JSON object with optional `title`, `year`, `type`,
/// `poster_url`, `deep_link`, `plex_rating_key`, `reason`, `score` and
/// `percent_complete` fields. Plain-text payloads produce string items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(pub Value);

impl Item {
    /// Field lookup; always `None` for non-object items.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }

    /// Display title. String items are their own title.
    pub fn title(&self) -> Option<String> {
        match &self.0 {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => match map.get("title")? {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            _ => None,
        }
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item(value)
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item(Value::String(value.to_string()))
    }
}

/// Outcome of a successful `/health` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthInfo {
    pub title: String,
    pub status: Option<String>,
}
