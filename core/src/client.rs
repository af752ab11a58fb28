//! Stateless HTTP request builder and response parser for the recommendation API.
//!
//! # Design
//! `RecommendationsClient` holds only the base URL and the optional API key
//! and carries no mutable state between calls. Each operation is split into
//! a `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. The caller executes the actual HTTP
//! round-trip, keeping the core deterministic and free of I/O dependencies.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::{self, NormalizedResult};
use crate::types::{HealthInfo, ListKind, RosterEntry};

pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_USERS: &str = "/api/users";
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Title reported for a validated API.
pub const DEFAULT_TITLE: &str = "Plex Recommendations";

/// Synchronous, stateless client for the recommendation API.
#[derive(Debug, Clone)]
pub struct RecommendationsClient {
    base_url: String,
    api_key: Option<String>,
}

impl RecommendationsClient {
    /// Trailing slashes of `base_url` are stripped; an empty key counts as
    /// no key.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_health(&self) -> HttpRequest {
        self.get(ENDPOINT_HEALTH)
    }

    pub fn build_users(&self) -> HttpRequest {
        self.get(ENDPOINT_USERS)
    }

    pub fn build_list(&self, kind: ListKind, user_id: &str) -> HttpRequest {
        self.get(&kind.path(user_id))
    }

    fn get(&self, path: &str) -> HttpRequest {
        let headers = match &self.api_key {
            Some(key) => vec![(API_KEY_HEADER.to_string(), key.clone())],
            None => Vec::new(),
        };
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{path}", self.base_url),
            headers,
        }
    }

    /// Setup-time validation: 401 means a bad key, anything else but 200
    /// is reported with its status.
    pub fn parse_health(&self, response: HttpResponse) -> Result<HealthInfo, ApiError> {
        if response.status == 401 {
            return Err(ApiError::InvalidAuth);
        }
        if response.status != 200 {
            return Err(ApiError::Upstream {
                status: response.status,
                message: format!("API returned status {}", response.status),
            });
        }
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        Ok(HealthInfo {
            title: DEFAULT_TITLE.to_string(),
            status: body.get("status").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// Roster body: a JSON array of users, or an object with a `users`
    /// array. Elements without an id are skipped.
    pub fn parse_users(&self, response: HttpResponse) -> Result<Vec<RosterEntry>, ApiError> {
        check_status(&response, 200)?;
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        let users = match &body {
            Value::Array(users) => users,
            Value::Object(map) => map
                .get("users")
                .and_then(Value::as_array)
                .ok_or_else(|| ApiError::MalformedResponse("object without a users array".to_string()))?,
            _ => return Err(ApiError::MalformedResponse("expected a list of users".to_string())),
        };
        Ok(users.iter().filter_map(RosterEntry::from_json).collect())
    }

    /// Per-user list responses never fail; see [`normalize`].
    pub fn parse_list(&self, kind: ListKind, response: &HttpResponse) -> NormalizedResult {
        normalize::normalize_response(kind, response)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    match response.status {
        401 => Err(ApiError::InvalidAuth),
        404 => Err(ApiError::NotFound),
        status => {
            let message = match normalize::normalize(status, None, &response.body) {
                NormalizedResult::Error { message } => message,
                NormalizedResult::Ok(_) => format!("HTTP {status}"),
            };
            Err(ApiError::Upstream { status, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> RecommendationsClient {
        RecommendationsClient::new("http://localhost:8000", None)
    }

    fn keyed() -> RecommendationsClient {
        RecommendationsClient::new("http://localhost:8000", Some("secret"))
    }

    #[test]
    fn build_users_produces_correct_request() {
        let req = client().build_users();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/api/users");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_list_uses_kind_template() {
        let req = client().build_list(ListKind::Recommendations, "42");
        assert_eq!(req.url, "http://localhost:8000/api/recommendations/42");
        let req = client().build_list(ListKind::Recent, "42");
        assert_eq!(req.url, "http://localhost:8000/api/recent/42");
    }

    #[test]
    fn api_key_header_only_when_configured() {
        let req = keyed().build_health();
        assert_eq!(req.url, "http://localhost:8000/health");
        assert_eq!(req.headers, vec![("X-API-Key".to_string(), "secret".to_string())]);

        let req = RecommendationsClient::new("http://localhost:8000", Some("")).build_health();
        assert!(req.headers.is_empty());
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = RecommendationsClient::new("http://localhost:8000//", None);
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.build_users().url, "http://localhost:8000/api/users");
    }

    #[test]
    fn parse_health_success() {
        let info = client()
            .parse_health(HttpResponse::new(200, r#"{"status":"healthy"}"#))
            .unwrap();
        assert_eq!(info.title, "Plex Recommendations");
        assert_eq!(info.status.as_deref(), Some("healthy"));
    }

    #[test]
    fn parse_health_unauthorized() {
        let err = client().parse_health(HttpResponse::new(401, "")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidAuth));
    }

    #[test]
    fn parse_health_other_status() {
        let err = client().parse_health(HttpResponse::new(503, "")).unwrap_err();
        assert!(matches!(err, ApiError::Upstream { status: 503, .. }));
    }

    #[test]
    fn parse_health_bad_json() {
        let err = client().parse_health(HttpResponse::new(200, "ok")).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn parse_users_array() {
        let body = json!([
            {"id": "u1", "name": "Alice"},
            {"id": 2},
            {"name": "missing id"}
        ]);
        let users = client().parse_users(HttpResponse::new(200, body.to_string())).unwrap();
        assert_eq!(users, vec![RosterEntry::new("u1", "Alice"), RosterEntry::new("2", "2")]);
    }

    #[test]
    fn parse_users_wrapped_object() {
        let body = r#"{"users":[{"id":"u1","name":"Alice"}]}"#;
        let users = client().parse_users(HttpResponse::new(200, body)).unwrap();
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn parse_users_error_status() {
        let err = client()
            .parse_users(HttpResponse::new(500, r#"{"detail":"db down"}"#))
            .unwrap_err();
        assert_eq!(err, ApiError::Upstream { status: 500, message: "db down".to_string() });

        let err = client().parse_users(HttpResponse::new(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_users_bad_json() {
        let err = client().parse_users(HttpResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
        let err = client().parse_users(HttpResponse::new(200, "7")).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn parse_list_normalizes() {
        let response = HttpResponse::new(200, r#"[{"title":"A"}]"#).with_content_type("application/json");
        let result = client().parse_list(ListKind::Recent, &response);
        assert_eq!(result.items().len(), 1);

        let result = client().parse_list(ListKind::Recent, &HttpResponse::new(404, ""));
        assert_eq!(result.error_message(), Some("Endpoint not found"));
    }
}
