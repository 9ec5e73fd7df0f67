use crate::message::OrderEvent;
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to order notifications and
/// broadcasting them to every local feed connection.
///
/// The `at` timestamp is stamped here, at publish time, never taken from the
/// request that caused the mutation.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
    clock: fn() -> i64,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self {
            sse_manager,
            clock: now_millis,
        }
    }

    #[cfg(test)]
    fn with_clock(sse_manager: Arc<Manager>, clock: fn() -> i64) -> Self {
        Self { sse_manager, clock }
    }

    fn to_order_event(&self, event: &DomainEvent) -> OrderEvent {
        let at = (self.clock)();
        match event {
            DomainEvent::OrderCreated { order_id, extra } => {
                let mut order_event = OrderEvent::created(order_id.clone(), at);
                for (key, value) in extra {
                    order_event = order_event.with_field(key.clone(), value.clone());
                }
                order_event
            }
            DomainEvent::OrderStatusUpdated {
                order_id,
                status,
                extra,
            } => {
                let mut order_event = OrderEvent::updated(order_id.clone(), status.clone(), at);
                for (key, value) in extra {
                    order_event = order_event.with_field(key.clone(), value.clone());
                }
                order_event
            }
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let order_event = self.to_order_event(event);
        let delivered = self.sse_manager.emit_order_event(&order_event);

        debug!(
            "Sent {:?} order event for {:?} to {} connection(s)",
            order_event.kind, order_event.id, delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::render;
    use serde_json::{json, Map, Value};

    fn frame_data(frame: &str) -> Value {
        let data = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        serde_json::from_str(data).unwrap()
    }

    #[tokio::test]
    async fn test_order_created_becomes_created_order_event() {
        let manager = Arc::new(Manager::new());
        let mut subscription = manager.subscribe();
        let handler = SseDomainEventHandler::with_clock(Arc::clone(&manager), || 1_000);

        handler
            .handle(&DomainEvent::order_created(Some("o7".to_string())))
            .await;

        let frame = render(vec![subscription.recv().await.unwrap()]).await;
        assert!(frame.starts_with("event: order\n"));
        assert_eq!(
            frame_data(&frame),
            json!({"type": "created", "id": "o7", "at": 1_000})
        );
    }

    #[tokio::test]
    async fn test_status_update_carries_status_and_extra_fields() {
        let manager = Arc::new(Manager::new());
        let mut subscription = manager.subscribe();
        let handler = SseDomainEventHandler::with_clock(Arc::clone(&manager), || 2_000);

        let mut extra = Map::new();
        extra.insert("channel".to_string(), json!("admin"));
        handler
            .handle(&DomainEvent::OrderStatusUpdated {
                order_id: Some("o1".to_string()),
                status: Some("shipped".to_string()),
                extra,
            })
            .await;

        let frame = render(vec![subscription.recv().await.unwrap()]).await;
        assert_eq!(
            frame_data(&frame),
            json!({"type": "updated", "id": "o1", "status": "shipped", "at": 2_000, "channel": "admin"})
        );
    }

    #[tokio::test]
    async fn test_default_clock_stamps_current_time() {
        let manager = Arc::new(Manager::new());
        let mut subscription = manager.subscribe();
        let handler = SseDomainEventHandler::new(Arc::clone(&manager));
        let before = now_millis();

        handler.handle(&DomainEvent::order_created(None)).await;

        let frame = render(vec![subscription.recv().await.unwrap()]).await;
        let at = frame_data(&frame)["at"].as_i64().unwrap();
        assert!(at >= before);
    }
}
