//! I/O-free core of the Plex recommendation sensors.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The caller executes the
//! actual HTTP round-trip, making the core fully deterministic and testable.
//!
//! # Design
//! - `RecommendationsClient` is stateless; it holds only the base URL and
//!   the optional API key.
//! - [`normalize`] turns any per-user list response into a
//!   [`NormalizedResult`] and never fails.
//! - [`SensorEntity`] holds one (user, list kind) pair's last outcome and
//!   derives the displayed value and attributes from it.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod entity;
pub mod error;
pub mod http;
pub mod normalize;
pub mod types;

pub use client::RecommendationsClient;
pub use entity::{EntitySnapshot, EntityState, FetchPhase, SensorEntity};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::{normalize, normalize_response, ItemList, NormalizedResult};
pub use types::{HealthInfo, Item, ListKind, RosterEntry};
