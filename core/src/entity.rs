//! Sensor entities: one per (user, list kind).
//!
//! # Design
//! An entity's displayed value is the length of its current item list and
//! everything else is published as attributes. Errors are data: a failed
//! fetch sets the `error` attribute but never makes the entity unavailable.
//!
//! When a fetch fails after an earlier success, the last good list is kept
//! on display next to the `error` attribute. A successful fetch clears the
//! error.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalize::{ItemList, NormalizedResult};
use crate::types::{Item, ListKind, RosterEntry};

/// Number of titles listed in the `titles` attribute.
pub const MAX_TITLES: usize = 10;

/// Number of leading items flattened into `item_{n}_*` attributes.
pub const FLATTENED_ITEMS: usize = 3;

const UNKNOWN_TITLE: &str = "Unknown";

/// `item_{n}_*` attributes that are always emitted, paired with the item
/// field they read. Absent fields are published as null.
const ITEM_FIELDS: [(&str, &str); 5] = [
    ("year", "year"),
    ("type", "type"),
    ("poster", "poster_url"),
    ("deep_link", "deep_link"),
    ("rating_key", "plex_rating_key"),
];

/// Whether a fetch is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    #[default]
    Idle,
    Fetching,
}

/// Last fetch outcome of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    phase: FetchPhase,
    last_good: Option<ItemList>,
    error: Option<String>,
}

impl EntityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    /// `Idle -> Fetching`.
    pub fn begin_fetch(&mut self) {
        self.phase = FetchPhase::Fetching;
    }

    /// `Fetching -> Idle`, storing the outcome.
    pub fn finish_fetch(&mut self, result: NormalizedResult) {
        match result {
            NormalizedResult::Ok(list) => {
                self.last_good = Some(list);
                self.error = None;
            }
            NormalizedResult::Error { message } => {
                self.error = Some(message);
            }
        }
        self.phase = FetchPhase::Idle;
    }

    pub fn items(&self) -> &[Item] {
        match &self.last_good {
            Some(list) => &list.items,
            None => &[],
        }
    }

    pub fn generated_at(&self) -> Option<&Value> {
        self.last_good.as_ref().and_then(|list| list.generated_at.as_ref())
    }

    /// Build the attribute mapping published for `user_id`'s `kind` list.
    pub fn attributes(&self, user_id: &str, kind: ListKind) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("user_id".to_string(), Value::String(user_id.to_string()));

        if let Some(generated_at) = self.generated_at() {
            attrs.insert("generated_at".to_string(), generated_at.clone());
        }

        let items = self.items();
        attrs.insert(
            kind.key().to_string(),
            Value::Array(items.iter().map(|item| item.0.clone()).collect()),
        );

        if !items.is_empty() {
            let titles = items
                .iter()
                .take(MAX_TITLES)
                .map(|item| Value::String(item.title().unwrap_or_else(|| UNKNOWN_TITLE.to_string())))
                .collect();
            attrs.insert("titles".to_string(), Value::Array(titles));

            for (index, item) in items.iter().take(FLATTENED_ITEMS).enumerate() {
                flatten_item(&mut attrs, index + 1, item);
            }
        }

        if let Some(error) = &self.error {
            attrs.insert("error".to_string(), Value::String(error.clone()));
        }

        attrs
    }
}

fn flatten_item(attrs: &mut Map<String, Value>, position: usize, item: &Item) {
    let prefix = format!("item_{position}_");

    attrs.insert(
        format!("{prefix}title"),
        item.title().map_or(Value::Null, Value::String),
    );
    for (suffix, field) in ITEM_FIELDS {
        attrs.insert(
            format!("{prefix}{suffix}"),
            item.get(field).cloned().unwrap_or(Value::Null),
        );
    }

    if let Some(reason) = item.get("reason") {
        attrs.insert(format!("{prefix}reason"), reason.clone());
    }
    if let Some(score) = item.get("score").and_then(Value::as_f64).and_then(round_score) {
        attrs.insert(format!("{prefix}score"), score);
    }
    if let Some(percent) = item.get("percent_complete") {
        attrs.insert(format!("{prefix}percent_complete"), percent.clone());
    }
}

/// Round to two decimals. `None` for non-finite scores.
fn round_score(score: f64) -> Option<Value> {
    let rounded = (score * 100.0).round() / 100.0;
    serde_json::Number::from_f64(rounded).map(Value::Number)
}

/// A displayed sensor bound to one (user, list kind) pair.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    user: RosterEntry,
    kind: ListKind,
    state: EntityState,
}

impl SensorEntity {
    pub fn new(user: RosterEntry, kind: ListKind) -> Self {
        Self {
            user,
            kind,
            state: EntityState::new(),
        }
    }

    /// Stable identity, `plex_{kind}_{user_id}`.
    pub fn unique_id(&self) -> String {
        unique_id(self.kind, &self.user.id)
    }

    /// Display name, e.g. `Plex Recommendations Alice`.
    pub fn name(&self) -> String {
        format!("Plex {} {}", self.kind.label(), self.user.name)
    }

    pub fn user(&self) -> &RosterEntry {
        &self.user
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    /// Displayed value: number of items in the current list.
    pub fn state(&self) -> usize {
        self.state.items().len()
    }

    pub fn attributes(&self) -> Map<String, Value> {
        self.state.attributes(&self.user.id, self.kind)
    }

    /// Always true; failures are published through the `error` attribute.
    pub fn available(&self) -> bool {
        true
    }

    pub fn entity_state(&self) -> &EntityState {
        &self.state
    }

    pub fn entity_state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            unique_id: self.unique_id(),
            name: self.name(),
            state: self.state(),
            available: self.available(),
            attributes: self.attributes(),
        }
    }
}

pub fn unique_id(kind: ListKind, user_id: &str) -> String {
    format!("plex_{}_{}", kind.key(), user_id)
}

/// What the host renders for an entity at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub unique_id: String,
    pub name: String,
    pub state: usize,
    pub available: bool,
    pub attributes: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    fn entity(kind: ListKind) -> SensorEntity {
        SensorEntity::new(RosterEntry::new("u1", "Alice"), kind)
    }

    fn fetched(kind: ListKind, result: NormalizedResult) -> SensorEntity {
        let mut e = entity(kind);
        e.entity_state_mut().begin_fetch();
        e.entity_state_mut().finish_fetch(result);
        e
    }

    #[test]
    fn identity_follows_kind_and_user() {
        let e = entity(ListKind::Recommendations);
        assert_eq!(e.unique_id(), "plex_recommendations_u1");
        assert_eq!(e.name(), "Plex Recommendations Alice");
        assert_eq!(entity(ListKind::Recent).name(), "Plex Recent Alice");
    }

    #[test]
    fn new_entity_is_empty_and_available() {
        let e = entity(ListKind::Recent);
        assert_eq!(e.state(), 0);
        assert!(e.available());
        assert_eq!(e.entity_state().phase(), FetchPhase::Idle);
        let attrs = e.attributes();
        assert_eq!(attrs["user_id"], "u1");
        assert_eq!(attrs["recent"], json!([]));
        assert!(!attrs.contains_key("titles"));
        assert!(!attrs.contains_key("error"));
    }

    #[test]
    fn phase_transitions() {
        let mut state = EntityState::new();
        state.begin_fetch();
        assert_eq!(state.phase(), FetchPhase::Fetching);
        state.finish_fetch(NormalizedResult::not_found());
        assert_eq!(state.phase(), FetchPhase::Idle);
    }

    #[test]
    fn json_array_scenario() {
        let result = normalize(200, Some("application/json"), r#"[{"title":"A"},{"title":"B"}]"#);
        let e = fetched(ListKind::Recommendations, result);
        assert_eq!(e.state(), 2);
        let attrs = e.attributes();
        assert_eq!(attrs["titles"], json!(["A", "B"]));
        assert_eq!(attrs["recommendations"], json!([{"title":"A"},{"title":"B"}]));
    }

    #[test]
    fn plain_text_scenario() {
        let e = fetched(ListKind::Recent, normalize(200, Some("text/plain"), "Inception\nTenet\n"));
        assert_eq!(e.state(), 2);
        let attrs = e.attributes();
        assert_eq!(attrs["titles"], json!(["Inception", "Tenet"]));
        assert_eq!(attrs["item_1_title"], "Inception");
        assert_eq!(attrs["item_1_year"], Value::Null);
    }

    #[test]
    fn not_found_scenario() {
        let e = fetched(ListKind::Recommendations, normalize(404, None, ""));
        assert_eq!(e.state(), 0);
        assert!(e.available());
        let attrs = e.attributes();
        assert_eq!(attrs["error"], "Endpoint not found");
        assert_eq!(attrs["recommendations"], json!([]));
    }

    #[test]
    fn network_error_scenario() {
        let e = fetched(ListKind::Recent, NormalizedResult::network_error("connection refused"));
        assert_eq!(e.state(), 0);
        assert_eq!(e.attributes()["error"], "Network error: connection refused");
    }

    #[test]
    fn error_keeps_last_good_items() {
        let mut e = fetched(ListKind::Recent, normalize(200, Some("application/json"), r#"["A","B","C"]"#));
        e.entity_state_mut().begin_fetch();
        e.entity_state_mut().finish_fetch(normalize(500, None, r#"{"detail":"db down"}"#));
        assert_eq!(e.state(), 3);
        let attrs = e.attributes();
        assert_eq!(attrs["error"], "db down");
        assert_eq!(attrs["titles"], json!(["A", "B", "C"]));

        e.entity_state_mut().begin_fetch();
        e.entity_state_mut().finish_fetch(normalize(200, Some("application/json"), r#"["D"]"#));
        assert_eq!(e.state(), 1);
        assert!(!e.attributes().contains_key("error"));
    }

    #[test]
    fn first_three_items_are_flattened() {
        let body = json!({
            "generated_at": "2024-05-01T10:00:00Z",
            "recommendations": [
                {
                    "title": "Heat", "year": 1995, "type": "movie",
                    "poster_url": "http://img/heat.jpg", "deep_link": "plex://heat",
                    "plex_rating_key": "123", "reason": "Because you watched Ronin",
                    "score": 0.87654
                },
                {"title": "Ronin", "percent_complete": 42},
                {"year": 2001},
                {"title": "Fourth"}
            ]
        });
        let e = fetched(ListKind::Recommendations, normalize(200, Some("application/json"), &body.to_string()));
        let attrs = e.attributes();

        assert_eq!(e.state(), 4);
        assert_eq!(attrs["generated_at"], "2024-05-01T10:00:00Z");
        assert_eq!(attrs["titles"], json!(["Heat", "Ronin", "Unknown", "Fourth"]));

        assert_eq!(attrs["item_1_title"], "Heat");
        assert_eq!(attrs["item_1_year"], 1995);
        assert_eq!(attrs["item_1_type"], "movie");
        assert_eq!(attrs["item_1_poster"], "http://img/heat.jpg");
        assert_eq!(attrs["item_1_deep_link"], "plex://heat");
        assert_eq!(attrs["item_1_rating_key"], "123");
        assert_eq!(attrs["item_1_reason"], "Because you watched Ronin");
        assert_eq!(attrs["item_1_score"], json!(0.88));
        assert!(!attrs.contains_key("item_1_percent_complete"));

        assert_eq!(attrs["item_2_percent_complete"], 42);
        assert!(!attrs.contains_key("item_2_reason"));
        assert!(!attrs.contains_key("item_2_score"));

        assert_eq!(attrs["item_3_title"], Value::Null);
        assert_eq!(attrs["item_3_year"], 2001);
        assert!(!attrs.contains_key("item_4_title"));
    }

    #[test]
    fn titles_are_capped() {
        let items: Vec<Value> = (0..15).map(|i| json!({"title": format!("T{i}")})).collect();
        let e = fetched(ListKind::Recent, normalize(200, Some("application/json"), &Value::Array(items).to_string()));
        assert_eq!(e.state(), 15);
        assert_eq!(e.attributes()["titles"].as_array().unwrap().len(), MAX_TITLES);
    }

    #[test]
    fn snapshot_mirrors_entity() {
        let e = fetched(ListKind::Recent, normalize(200, Some("text/plain"), "One"));
        let snap = e.snapshot();
        assert_eq!(snap.unique_id, "plex_recent_u1");
        assert_eq!(snap.state, 1);
        assert!(snap.available);
        assert_eq!(snap.attributes, e.attributes());
    }
}
