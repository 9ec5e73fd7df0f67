use crate::connection::{BroadcastReport, ClientSender, ConnectionId, ConnectionRegistry};
use crate::message::{sse_event, EventType, OrderEvent};
use axum::response::sse::Event;
use log::*;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};

/// Frames a client may have queued before new frames are dropped for it.
pub const DEFAULT_CLIENT_BUFFER: usize = 32;
/// Consecutive dropped frames after which a client is evicted.
pub const DEFAULT_MAX_LAGGED_FRAMES: u32 = 64;

/// Broadcast registry for the local order feed.
///
/// One instance lives for the whole process and is shared through `AppState`.
/// `publish` never awaits: each client owns a bounded queue that its HTTP
/// response drains, so a stalled client cannot hold up the others.
pub struct Manager {
    registry: ConnectionRegistry,
    client_buffer: usize,
    closed: AtomicBool,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CLIENT_BUFFER, DEFAULT_MAX_LAGGED_FRAMES)
    }

    pub fn with_limits(client_buffer: usize, max_lagged_frames: u32) -> Self {
        Self {
            registry: ConnectionRegistry::new(max_lagged_frames),
            client_buffer: client_buffer.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a bounded frame queue sized for one client.
    pub fn client_channel(&self) -> (ClientSender, Receiver<Event>) {
        mpsc::channel(self.client_buffer)
    }

    /// Register a new connection and return its unique ID
    pub fn register_connection(&self, sender: ClientSender) -> ConnectionId {
        if self.is_shut_down() {
            warn!("Rejecting SSE connection registered after shutdown");
            drop(sender);
            return ConnectionId::new();
        }

        let connection_id = self.registry.register(sender);

        // A shutdown between the check above and the insert has already
        // cleared the registry, so this client must not outlive it.
        if self.is_shut_down() {
            warn!("SSE connection registered during shutdown, closing it");
            self.registry.unregister(&connection_id);
            return connection_id;
        }

        info!(
            "Registered new SSE connection {} ({} active)",
            connection_id.as_str(),
            self.registry.len()
        );
        connection_id
    }

    /// Unregister a connection by ID. Safe to call more than once.
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if self.registry.unregister(connection_id) {
            info!("Unregistered SSE connection {}", connection_id.as_str());
        }
    }

    /// Register a fresh client queue and hand back a subscription that
    /// unregisters itself when dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = self.client_channel();
        let connection_id = self.register_connection(sender);

        Subscription {
            connection_id,
            receiver,
            manager: Arc::clone(self),
        }
    }

    /// Send `payload` as an `event_name` frame to every client. A payload that
    /// is already a string is sent as-is; anything else is serialized as JSON.
    /// Returns the number of clients whose queue accepted the frame.
    pub fn publish<T: Serialize + ?Sized>(&self, event_name: &str, payload: &T) -> usize {
        match serde_json::to_value(payload) {
            Ok(Value::String(data)) => self.publish_data(event_name, &data),
            Ok(value) => self.publish_data(event_name, &value.to_string()),
            Err(e) => {
                error!("Failed to serialize SSE event {event_name}: {e}");
                0
            }
        }
    }

    /// Send pre-serialized `data` as an `event_name` frame to every client.
    pub fn publish_data(&self, event_name: &str, data: &str) -> usize {
        let event = sse_event(event_name, data);
        let report: BroadcastReport = self.registry.broadcast(&event);

        debug!(
            "Published SSE event {}: delivered={} dropped={} removed={}",
            event_name, report.delivered, report.dropped, report.removed
        );

        report.delivered
    }

    pub fn emit_order_event(&self, event: &OrderEvent) -> usize {
        self.publish(event.event_type(), event)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every registered client and refuse new ones.
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let closed = self.registry.clear();
        info!("SSE manager shut down, closed {closed} connection(s)");
        closed
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered client queue. Dropping it unregisters the connection.
pub struct Subscription {
    connection_id: ConnectionId,
    receiver: Receiver<Event>,
    manager: Arc<Manager>,
}

impl Subscription {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Next queued event, or `None` once the manager closed this client.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(
            "SSE subscription {} dropped, cleaning up",
            self.connection_id.as_str()
        );
        self.manager.unregister_connection(&self.connection_id);
    }
}
