//! Server-Sent Events infrastructure for the local order feed.
//!
//! This crate provides the broadcast side of live order notifications:
//! - `connection`: `ConnectionRegistry`, a concurrent set of bounded client queues
//! - `manager`: `Manager`, the process-wide registry service (publish, subscribe, shutdown)
//! - `message`: `OrderEvent` payloads and their SSE events
//! - `domain_event_handler`: bridges `events::DomainEvent`s into order events

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;

pub use manager::{Manager, Subscription};
