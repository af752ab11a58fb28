//! Async host for the Plex recommendation sensors.
//!
//! # Overview
//! Drives the I/O-free `plexrec-core` client on a tokio runtime: it validates
//! the API during setup, polls the user roster on a fixed interval, and keeps
//! two sensors per user (recommendations and recently watched) up to date.
//!
//! # Design
//! - [`transport::Transport`] executes the requests the core builds;
//!   [`transport::ReqwestTransport`] is the production implementation.
//! - [`poller::RosterPoller`] is the single shared roster fetch; entities
//!   never poll on their own schedule.
//! - [`fetcher::FetchWorker`] owns all entity state and serializes fetches.
//! - [`integration::setup_entry`] wires the pieces together and returns a
//!   handle that unloads them.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod integration;
pub mod poller;
pub mod setup;
pub mod transport;

pub use config::Config;
pub use error::SetupError;
pub use integration::{setup_entry, Integration};
pub use setup::validate_api;
pub use transport::{ReqwestTransport, Transport, TransportError};
