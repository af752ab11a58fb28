//! Lifecycle of one configured integration.
//!
//! # Design
//! [`setup_entry`] performs the first roster poll inline; if it fails the
//! whole setup is reported as not ready so the host can retry later. On
//! success it creates two entities per user and spawns the background
//! tasks:
//! - the fetch worker, sole owner of entity state;
//! - the roster poller loop;
//! - a relay that re-queues every entity when a new roster is published;
//! - one short-lived task per entity that performs its first fetch after a
//!   random startup delay.
//!
//! [`Integration::unload`] aborts all of them.

use std::collections::HashSet;
use std::sync::Arc;

use plexrec_core::{EntitySnapshot, ListKind, RosterEntry, SensorEntity};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SetupError;
use crate::fetcher::{jitter_delay, EntityKey, FetchQueue, FetchWorker};
use crate::poller::{Roster, RosterPoller};
use crate::transport::Transport;

/// One entity per (user, list kind). Users repeated in the roster are
/// only counted once.
pub fn create_entities(roster: &[RosterEntry]) -> Vec<SensorEntity> {
    let mut seen = HashSet::new();
    roster
        .iter()
        .filter(|user| seen.insert(user.id.as_str()))
        .flat_map(|user| ListKind::ALL.into_iter().map(move |kind| SensorEntity::new(user.clone(), kind)))
        .collect()
}

/// A running integration. Dropping it without calling [`Integration::unload`]
/// leaves the background tasks running.
pub struct Integration {
    poller: Arc<RosterPoller>,
    queue: FetchQueue,
    keys: Vec<EntityKey>,
    tasks: Vec<JoinHandle<()>>,
}

/// Set up the integration and start its background tasks.
///
/// Returns the integration handle and the stream of entity snapshots, one
/// per completed fetch.
pub async fn setup_entry(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<(Integration, mpsc::UnboundedReceiver<EntitySnapshot>), SetupError> {
    config.validate()?;
    let client = config.client();

    let poller = Arc::new(RosterPoller::new(
        transport.clone(),
        client.clone(),
        config.roster_timeout(),
    ));
    let roster = poller.refresh().await.map_err(SetupError::NotReady)?;
    if roster.is_empty() {
        warn!("No users returned by API; no sensors will be created");
    }

    let entities = create_entities(&roster);
    let keys: Vec<EntityKey> = entities.iter().map(EntityKey::of).collect();
    info!(users = roster.len(), sensors = keys.len(), "Setting up recommendation sensors");

    let (updates, snapshots) = mpsc::unbounded_channel();
    let (worker, queue) = FetchWorker::new(transport, client, config.fetch_timeout(), entities, updates);

    let mut tasks = vec![
        tokio::spawn(worker.run()),
        tokio::spawn(poller.clone().run(config.scan_interval())),
        tokio::spawn(relay_roster_updates(poller.clone(), queue.clone(), keys.clone())),
    ];

    let max_jitter = config.startup_jitter();
    for key in &keys {
        let queue = queue.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(jitter_delay(max_jitter)).await;
            queue.request_fetch(key);
        }));
    }

    let integration = Integration {
        poller,
        queue,
        keys,
        tasks,
    };
    Ok((integration, snapshots))
}

/// Re-queue every entity whenever the poller publishes a new roster.
async fn relay_roster_updates(poller: Arc<RosterPoller>, queue: FetchQueue, keys: Vec<EntityKey>) {
    // A fresh receiver treats the setup roster as seen; the initial fetches cover it.
    let mut roster = poller.subscribe();
    while roster.changed().await.is_ok() {
        let users = roster.borrow_and_update().len();
        info!(users, "Roster updated; refreshing sensors");
        for key in &keys {
            if !queue.request_fetch(key.clone()) {
                return;
            }
        }
    }
}

impl Integration {
    /// Unique ids of the created entities, in creation order.
    pub fn unique_ids(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|key| plexrec_core::entity::unique_id(key.kind, &key.user_id))
            .collect()
    }

    /// Current snapshot of every entity, sorted by unique id.
    pub async fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.queue.snapshots().await
    }

    /// Poll the roster now instead of waiting for the next tick. A success
    /// re-fetches every entity.
    pub async fn refresh_roster(&self) -> Result<Roster, plexrec_core::ApiError> {
        self.poller.refresh().await
    }

    pub fn roster(&self) -> Roster {
        self.poller.roster()
    }

    /// Stop every background task. Entity state is discarded.
    pub fn unload(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(tasks = self.tasks.len(), "Integration unloaded");
    }
}
