use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const GENERATED_AT: &str = "2024-05-01T10:00:00Z";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// A fixed response served instead of the generated one.
#[derive(Clone, Debug)]
pub struct Canned {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.to_string(),
        }
    }
}

impl IntoResponse for Canned {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListKind {
    Recommendations,
    Recent,
}

/// Everything the mock API serves, plus a per-path hit counter.
#[derive(Debug, Default)]
pub struct MockApi {
    pub api_key: Option<String>,
    pub users: Vec<User>,
    pub users_override: Option<Canned>,
    pub lists: HashMap<(ListKind, String), Canned>,
    pub hits: HashMap<String, usize>,
}

impl MockApi {
    /// Two users with a short recommendation and recent list each.
    pub fn demo() -> Self {
        let mut api = MockApi {
            users: vec![User::new("1", "Alice"), User::new("2", "Bob")],
            ..MockApi::default()
        };
        api.set_list(
            ListKind::Recommendations,
            "1",
            Canned::json(
                200,
                json!({
                    "user_id": "1",
                    "generated_at": GENERATED_AT,
                    "recommendations": [
                        {"title": "Heat", "year": 1995, "type": "movie", "score": 0.91,
                         "reason": "Because you watched Ronin", "plex_rating_key": "101"},
                        {"title": "Collateral", "year": 2004, "type": "movie", "score": 0.84}
                    ]
                }),
            ),
        );
        api.set_list(
            ListKind::Recent,
            "1",
            Canned::json(200, json!([{"title": "Ronin", "year": 1998, "percent_complete": 40}])),
        );
        api.set_list(ListKind::Recent, "2", Canned::text(200, "Alien\nAliens\n"));
        api
    }

    pub fn set_list(&mut self, kind: ListKind, user_id: &str, canned: Canned) {
        self.lists.insert((kind, user_id.to_string()), canned);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.get(path).copied().unwrap_or(0)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(key) => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == key),
        }
    }
}

pub type Db = Arc<RwLock<MockApi>>;

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(MockApi::default())))
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users))
        .route("/api/recommendations/{user_id}", get(recommendations))
        .route("/api/recent/{user_id}", get(recent))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

fn unauthorized() -> Response {
    Canned::json(401, json!({"detail": "Invalid API key"})).into_response()
}

/// Count the hit and check the key. `Err` carries the 401 to return.
async fn admit(db: &Db, path: String, headers: &HeaderMap) -> Result<(), Response> {
    let mut api = db.write().await;
    *api.hits.entry(path).or_insert(0) += 1;
    if api.authorized(headers) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

async fn health(State(db): State<Db>, headers: HeaderMap) -> Response {
    if let Err(resp) = admit(&db, "/health".to_string(), &headers).await {
        return resp;
    }
    Canned::json(200, json!({"status": "healthy"})).into_response()
}

async fn list_users(State(db): State<Db>, headers: HeaderMap) -> Response {
    if let Err(resp) = admit(&db, "/api/users".to_string(), &headers).await {
        return resp;
    }
    let api = db.read().await;
    match &api.users_override {
        Some(canned) => canned.clone().into_response(),
        None => Canned::json(200, json!(api.users)).into_response(),
    }
}

async fn recommendations(
    State(db): State<Db>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    serve_list(db, ListKind::Recommendations, user_id, headers).await
}

async fn recent(State(db): State<Db>, Path(user_id): Path<String>, headers: HeaderMap) -> Response {
    serve_list(db, ListKind::Recent, user_id, headers).await
}

async fn serve_list(db: Db, kind: ListKind, user_id: String, headers: HeaderMap) -> Response {
    let path = match kind {
        ListKind::Recommendations => format!("/api/recommendations/{user_id}"),
        ListKind::Recent => format!("/api/recent/{user_id}"),
    };
    if let Err(resp) = admit(&db, path, &headers).await {
        return resp;
    }

    let api = db.read().await;
    if let Some(canned) = api.lists.get(&(kind, user_id.clone())) {
        return canned.clone().into_response();
    }
    if !api.users.iter().any(|u| u.id == user_id) {
        return Canned::json(404, json!({"detail": "User not found"})).into_response();
    }
    let key = match kind {
        ListKind::Recommendations => "recommendations",
        ListKind::Recent => "recent",
    };
    Canned::json(
        200,
        json!({"user_id": user_id, "generated_at": GENERATED_AT, key: []}),
    )
    .into_response()
}
