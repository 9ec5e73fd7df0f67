use axum::response::sse::Event;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the SSE event carrying order notifications.
pub const ORDER_EVENT: &str = "order";

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEventKind {
    Created,
    Updated,
}

/// Payload of an `order` SSE frame.
///
/// The known fields are typed; anything else the publisher wants to forward
/// goes into `extra`, which is flattened into the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    #[serde(rename = "type")]
    pub kind: OrderEventKind,
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Milliseconds since the Unix epoch, stamped by the publisher.
    pub at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderEvent {
    pub fn created(id: Option<String>, at: i64) -> Self {
        Self {
            kind: OrderEventKind::Created,
            id,
            status: None,
            at,
            extra: Map::new(),
        }
    }

    pub fn updated(id: Option<String>, status: Option<String>, at: i64) -> Self {
        Self {
            kind: OrderEventKind::Updated,
            id,
            status,
            at,
            extra: Map::new(),
        }
    }

    /// Adds an extension field. Known field names are ignored so the typed
    /// fields cannot be shadowed.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !matches!(key.as_str(), "type" | "id" | "status" | "at") {
            self.extra.insert(key, value);
        }
        self
    }
}

impl EventType for OrderEvent {
    fn event_type(&self) -> &'static str {
        ORDER_EVENT
    }
}

/// Builds the SSE event for one notification.
///
/// `Event` refuses line breaks in the event name and carriage returns in
/// data, so the name is stripped of them and data line endings become `\n`.
pub fn sse_event(event_name: &str, data: &str) -> Event {
    let event_name: String = event_name
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();
    let data = data.replace("\r\n", "\n").replace('\r', "\n");

    Event::default().event(event_name).data(data)
}
