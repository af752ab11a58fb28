//! Response normalizer for per-user list endpoints.
//!
//! # Design
//! The upstream API is not trusted to return well-formed JSON with a stable
//! schema. `normalize` classifies whatever came back into a
//! [`NormalizedResult`]: either an item list or an error message. All
//! "what shape is this payload" logic lives here so entities never branch on
//! payload shape themselves.
//!
//! The function is total. A 200 response always yields `Ok` (unparseable
//! bodies degrade to one item per non-empty line), every other outcome
//! yields `Error`, and a panic inside classification is caught at the
//! boundary and reported as `Unexpected error: ...`.

use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};

use serde_json::{Map, Value};

use crate::http::HttpResponse;
use crate::types::{Item, ListKind};

pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found";

/// Keys searched, in order, for the item array of a mapping payload.
const ITEM_KEYS: [&str; 3] = ["items", "recommendations", "recent"];

/// Keys searched, in order, for a human-readable error message.
const DETAIL_KEYS: [&str; 3] = ["detail", "message", "error"];

const GENERATED_AT: &str = "generated_at";

/// A successfully normalized payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemList {
    pub items: Vec<Item>,
    pub generated_at: Option<Value>,
    /// Every key of a mapping payload, untouched. Empty for array, scalar
    /// and plain-text payloads.
    pub fields: Map<String, Value>,
}

impl ItemList {
    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

/// Uniform outcome of one list fetch.
///
/// An `Error` carries no items; [`NormalizedResult::items`] returns an empty
/// slice for it so display code treats "failed" and "empty" alike.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResult {
    Ok(ItemList),
    Error { message: String },
}

impl NormalizedResult {
    pub fn error(message: impl Into<String>) -> Self {
        NormalizedResult::Error {
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::error(NOT_FOUND_MESSAGE)
    }

    /// No status was received: connection failure or timeout.
    pub fn network_error(description: impl std::fmt::Display) -> Self {
        Self::error(format!("Network error: {description}"))
    }

    pub fn unexpected(description: impl std::fmt::Display) -> Self {
        Self::error(format!("Unexpected error: {description}"))
    }

    pub fn items(&self) -> &[Item] {
        match self {
            NormalizedResult::Ok(list) => &list.items,
            NormalizedResult::Error { .. } => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            NormalizedResult::Ok(_) => None,
            NormalizedResult::Error { message } => Some(message),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, NormalizedResult::Ok(_))
    }
}

/// Classify a raw response. Never panics and never fails.
pub fn normalize(status: u16, content_type: Option<&str>, body: &str) -> NormalizedResult {
    guarded(|| classify(status, content_type, body, None))
}

/// [`normalize`] applied to a response of the `kind` list. When a mapping
/// carries arrays under both list keys, the one named after `kind` wins.
pub fn normalize_response(kind: ListKind, response: &HttpResponse) -> NormalizedResult {
    let content_type = response.content_type();
    guarded(|| classify(response.status, content_type, &response.body, Some(kind)))
}

/// Run `f`, converting a panic into an `Unexpected error` result.
fn guarded<F>(f: F) -> NormalizedResult
where
    F: FnOnce() -> NormalizedResult + UnwindSafe,
{
    catch_unwind(f).unwrap_or_else(|payload| NormalizedResult::unexpected(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic while normalizing response".to_string()
    }
}

fn classify(status: u16, content_type: Option<&str>, body: &str, kind: Option<ListKind>) -> NormalizedResult {
    match status {
        200 => NormalizedResult::Ok(parse_success_body(content_type, body, kind)),
        404 => NormalizedResult::not_found(),
        _ => {
            let message = error_detail(body).unwrap_or_else(|| format!("HTTP {status}"));
            NormalizedResult::Error { message }
        }
    }
}

fn parse_success_body(content_type: Option<&str>, body: &str, kind: Option<ListKind>) -> ItemList {
    let structured = if content_type.is_some_and(is_json) {
        serde_json::from_str::<Value>(body)
            .ok()
            .map(|value| from_value(value, kind))
    } else {
        parse_structured_text(body, kind)
    };
    structured.unwrap_or_else(|| ItemList::from_items(split_lines(body)))
}

/// `application/json` anywhere in the header, or a `+json` media subtype.
fn is_json(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    if lowered.contains("application/json") {
        return true;
    }
    lowered
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().ends_with("+json"))
}

/// YAML parse of a non-JSON body. A sequence, or a mapping shaped like a
/// list payload, counts as structured. Anything else falls through to line
/// splitting: bare scalars, empty documents, and text such as
/// `Alien: Covenant` that YAML happens to read as a mapping.
fn parse_structured_text(body: &str, kind: Option<ListKind>) -> Option<ItemList> {
    match serde_yaml::from_str::<Value>(body).ok()? {
        Value::Object(map) if is_list_payload(&map) => Some(from_map(map, kind)),
        value @ Value::Array(_) => Some(from_value(value, kind)),
        _ => None,
    }
}

/// An array under one of [`ITEM_KEYS`], or a `generated_at` key.
fn is_list_payload(map: &Map<String, Value>) -> bool {
    map.contains_key(GENERATED_AT) || ITEM_KEYS.iter().any(|key| map.get(*key).is_some_and(Value::is_array))
}

/// [`ITEM_KEYS`] with `kind`'s own key moved ahead of the other list key.
fn item_keys(kind: Option<ListKind>) -> [&'static str; 3] {
    let mut keys = ITEM_KEYS;
    if let Some(pos) = kind.and_then(|kind| keys.iter().position(|key| *key == kind.key())) {
        keys[1..=pos].rotate_right(1);
    }
    keys
}

fn from_value(value: Value, kind: Option<ListKind>) -> ItemList {
    match value {
        Value::Object(map) => from_map(map, kind),
        Value::Array(items) => ItemList::from_items(items.into_iter().map(Item).collect()),
        Value::Null => ItemList::default(),
        scalar => ItemList::from_items(vec![Item(Value::String(stringify(&scalar)))]),
    }
}

fn from_map(map: Map<String, Value>, kind: Option<ListKind>) -> ItemList {
    let items = item_keys(kind)
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
        .map(|items| items.iter().cloned().map(Item).collect())
        .unwrap_or_default();
    let generated_at = map.get(GENERATED_AT).filter(|v| !v.is_null()).cloned();
    ItemList {
        items,
        generated_at,
        fields: map,
    }
}

fn split_lines(body: &str) -> Vec<Item> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Item::from)
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Best-effort message from a JSON error body.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let map = value.as_object()?;
    DETAIL_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(stringify(other)),
    })
}
