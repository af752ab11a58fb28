//! Per-entity list fetches.
//!
//! # Design
//! A single [`FetchWorker`] task owns every [`SensorEntity`]. Anything that
//! wants an entity refreshed sends a [`FetchRequest`] through a cloneable
//! [`FetchQueue`]. No locks are needed because nothing else touches entity
//! state.
//!
//! Only the HTTP round-trips leave the worker: each one runs as a task in a
//! `JoinSet`, and the worker applies the outcomes as they finish, so one slow
//! endpoint never holds back the others. At most one fetch per entity is in
//! flight; requests arriving meanwhile collapse into a single re-fetch once
//! it completes.
//!
//! After every fetch the entity's snapshot is pushed on an unbounded
//! channel for the host to render.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use plexrec_core::{EntitySnapshot, HttpResponse, ListKind, NormalizedResult, RecommendationsClient, SensorEntity};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError};

/// Identity of one entity: a list kind for one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: ListKind,
    pub user_id: String,
}

impl EntityKey {
    pub fn new(kind: ListKind, user_id: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
        }
    }

    pub fn of(entity: &SensorEntity) -> Self {
        Self::new(entity.kind(), entity.user().id.clone())
    }
}

pub enum FetchRequest {
    Fetch(EntityKey),
    Snapshot(oneshot::Sender<Vec<EntitySnapshot>>),
}

/// Sending side of the worker's request channel.
#[derive(Clone)]
pub struct FetchQueue {
    tx: mpsc::UnboundedSender<FetchRequest>,
}

impl FetchQueue {
    /// Ask for `key` to be re-fetched. Returns false once the worker is gone.
    pub fn request_fetch(&self, key: EntityKey) -> bool {
        self.tx.send(FetchRequest::Fetch(key)).is_ok()
    }

    /// Current snapshot of every entity, sorted by unique id. Empty once the
    /// worker is gone.
    pub async fn snapshots(&self) -> Vec<EntitySnapshot> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(FetchRequest::Snapshot(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

type RoundTrip = Result<HttpResponse, TransportError>;

pub struct FetchWorker {
    transport: Arc<dyn Transport>,
    client: RecommendationsClient,
    timeout: Duration,
    entities: HashMap<EntityKey, SensorEntity>,
    requests: mpsc::UnboundedReceiver<FetchRequest>,
    updates: mpsc::UnboundedSender<EntitySnapshot>,
    in_flight: JoinSet<RoundTrip>,
    running: HashMap<TaskId, EntityKey>,
    refetch: HashSet<EntityKey>,
}

impl FetchWorker {
    /// Create the worker and the queue that feeds it.
    pub fn new(
        transport: Arc<dyn Transport>,
        client: RecommendationsClient,
        timeout: Duration,
        entities: Vec<SensorEntity>,
        updates: mpsc::UnboundedSender<EntitySnapshot>,
    ) -> (Self, FetchQueue) {
        let (tx, requests) = mpsc::unbounded_channel();
        let entities = entities.into_iter().map(|e| (EntityKey::of(&e), e)).collect();
        let worker = Self {
            transport,
            client,
            timeout,
            entities,
            requests,
            updates,
            in_flight: JoinSet::new(),
            running: HashMap::new(),
            refetch: HashSet::new(),
        };
        (worker, FetchQueue { tx })
    }

    /// Process requests until every [`FetchQueue`] is dropped and the last
    /// fetch in flight has been applied.
    pub async fn run(mut self) {
        info!(entities = self.entities.len(), "Fetch worker started");
        let mut open = true;
        loop {
            tokio::select! {
                biased;
                request = self.requests.recv(), if open => match request {
                    Some(request) => self.accept(request),
                    None => open = false,
                },
                Some(joined) = self.in_flight.join_next_with_id() => self.complete(joined),
                else => break,
            }
        }
        info!("Fetch worker stopped");
    }

    fn accept(&mut self, request: FetchRequest) {
        match request {
            FetchRequest::Fetch(key) => {
                if !self.entities.contains_key(&key) {
                    debug!(kind = %key.kind, user_id = %key.user_id, "Ignoring fetch for unknown entity");
                    return;
                }
                if self.running.values().any(|running| *running == key) {
                    self.refetch.insert(key);
                } else {
                    self.start(key);
                }
            }
            FetchRequest::Snapshot(reply) => {
                let _ = reply.send(self.snapshots());
            }
        }
    }

    fn snapshots(&self) -> Vec<EntitySnapshot> {
        let mut all: Vec<_> = self.entities.values().map(SensorEntity::snapshot).collect();
        all.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        all
    }

    /// Mark the entity as fetching and spawn its round-trip.
    fn start(&mut self, key: EntityKey) {
        let Some(entity) = self.entities.get_mut(&key) else {
            return;
        };
        entity.entity_state_mut().begin_fetch();

        let request = self.client.build_list(key.kind, &key.user_id);
        let transport = self.transport.clone();
        let timeout = self.timeout;
        let handle = self
            .in_flight
            .spawn(async move { transport.execute(request, timeout).await });
        self.running.insert(handle.id(), key);
    }

    /// Apply a finished round-trip to its entity and publish the snapshot.
    fn complete(&mut self, joined: Result<(TaskId, RoundTrip), JoinError>) {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let Some(key) = self.running.remove(&id) else {
            return;
        };

        let result = match joined {
            Ok((_, Ok(response))) => self.client.parse_list(key.kind, &response),
            Ok((_, Err(e))) => NormalizedResult::network_error(e),
            Err(e) => NormalizedResult::unexpected(e),
        };

        match &result {
            NormalizedResult::Ok(list) => {
                debug!(kind = %key.kind, user_id = %key.user_id, items = list.items.len(), "Fetched list");
            }
            NormalizedResult::Error { message } => {
                warn!(kind = %key.kind, user_id = %key.user_id, error = %message, "List fetch failed");
            }
        }

        if let Some(entity) = self.entities.get_mut(&key) {
            entity.entity_state_mut().finish_fetch(result);
            // The host may have stopped listening; state is still kept.
            let _ = self.updates.send(entity.snapshot());
        }

        if self.refetch.remove(&key) {
            self.start(key);
        }
    }
}

/// Random delay in `[0, max]`, spreading the first fetches of many
/// entities so they do not hit the API at once.
pub fn jitter_delay(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}
