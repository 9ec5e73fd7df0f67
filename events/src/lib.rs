//! Event system infrastructure for the order relay.
//!
//! This crate provides the event system that decouples the order mutation
//! operations from infrastructure concerns (like SSE notifications).
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing the order lifecycle events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Additional order data is carried as serialized JSON values.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Order identifiers are opaque strings assigned by the backend.
pub type OrderId = String;

/// Domain events that represent order-level changes observed by this process.
/// These events are emitted only after the backend accepted the mutation (2xx).
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Emitted when the backend accepted a new order.
    OrderCreated {
        /// Identifier read from the backend response, when it returned one.
        order_id: Option<OrderId>,
        /// Extra fields forwarded verbatim into the notification payload.
        extra: Map<String, Value>,
    },
    /// Emitted when the backend accepted an order status change.
    OrderStatusUpdated {
        order_id: Option<OrderId>,
        /// The status requested by the caller.
        status: Option<String>,
        extra: Map<String, Value>,
    },
}

impl DomainEvent {
    pub fn order_created(order_id: Option<OrderId>) -> Self {
        DomainEvent::OrderCreated {
            order_id,
            extra: Map::new(),
        }
    }

    pub fn order_status_updated(order_id: Option<OrderId>, status: Option<String>) -> Self {
        DomainEvent::OrderStatusUpdated {
            order_id,
            status,
            extra: Map::new(),
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            DomainEvent::OrderCreated { order_id, .. }
            | DomainEvent::OrderStatusUpdated { order_id, .. } => order_id.as_deref(),
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers are called sequentially and cannot fail the caller.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
