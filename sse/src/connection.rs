use axum::response::sse::Event;
use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Write half of a client's bounded frame queue.
pub type ClientSender = Sender<Event>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered output stream.
#[derive(Debug)]
struct Client {
    sender: ClientSender,
    /// Consecutive frames dropped because the queue was full.
    lagged: AtomicU32,
}

/// Outcome of one broadcast, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients whose queue accepted the frame.
    pub delivered: usize,
    /// Clients that skipped the frame because their queue was full.
    pub dropped: usize,
    /// Clients removed during this broadcast.
    pub removed: usize,
}

/// Concurrent set of live SSE clients.
///
/// Writes are non-blocking `try_send`s into each client's bounded queue:
/// a full queue drops the new frame for that client only, a closed queue
/// removes the client.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Client>>,
    max_lagged_frames: u32,
}

impl ConnectionRegistry {
    pub fn new(max_lagged_frames: u32) -> Self {
        Self {
            connections: DashMap::new(),
            max_lagged_frames: max_lagged_frames.max(1),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, sender: ClientSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            Arc::new(Client {
                sender,
                lagged: AtomicU32::new(0),
            }),
        );

        connection_id
    }

    /// Unregister a connection - O(1). Returns whether it was still registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        self.connections.remove(connection_id).is_some()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Offer `event` to every client registered at the time of the call - O(n)
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        // Shard locks are released before any removal happens below.
        let snapshot: Vec<(ConnectionId, Arc<Client>)> = self
            .connections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut report = BroadcastReport::default();

        for (connection_id, client) in snapshot {
            match client.sender.try_send(event.clone()) {
                Ok(()) => {
                    client.lagged.store(0, Ordering::Relaxed);
                    report.delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    let lagged = client.lagged.fetch_add(1, Ordering::Relaxed) + 1;
                    if lagged >= self.max_lagged_frames {
                        warn!(
                            "Evicting SSE connection {} after {} consecutive dropped frames",
                            connection_id.as_str(),
                            lagged
                        );
                        self.unregister(&connection_id);
                        report.removed += 1;
                    } else {
                        debug!(
                            "SSE connection {} is lagging, dropped frame ({} in a row)",
                            connection_id.as_str(),
                            lagged
                        );
                        report.dropped += 1;
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(
                        "Failed to send event to connection {}: receiver closed. Removing it.",
                        connection_id.as_str()
                    );
                    self.unregister(&connection_id);
                    report.removed += 1;
                }
            }
        }

        report
    }

    /// Drop every client sender, ending each client's stream. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(crate::manager::DEFAULT_MAX_LAGGED_FRAMES)
    }
}
