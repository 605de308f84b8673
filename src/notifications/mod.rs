//! Real-time market events.
//!
//! State changes are broadcast to connected WebSocket viewers as a best-effort
//! side channel. Delivery is at-most-once with no replay; clients that miss an
//! event re-fetch from the listing and bid endpoints.

pub mod email;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::VehicleResponse;

/// Events pushed to connected viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    NewVehicle {
        vehicle: VehicleResponse,
    },
    NewBid {
        vehicle_id: String,
        amount: i64,
    },
    BookingConfirmed {
        vehicle_id: String,
        booking_id: String,
    },
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out over a tokio broadcast channel. Publishing never blocks and never
/// fails the request; with no listeners the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<MarketEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: MarketEvent) {
        // Err only means no active subscribers
        let _ = self.tx.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let events = EventBroadcaster::new();
        let mut rx = events.subscribe();

        events.publish(MarketEvent::NewBid {
            vehicle_id: "v1".into(),
            amount: 12000,
        });

        match rx.recv().await.unwrap() {
            MarketEvent::NewBid { vehicle_id, amount } => {
                assert_eq!(vehicle_id, "v1");
                assert_eq!(amount, 12000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_listeners_is_fine() {
        let events = EventBroadcaster::new();
        events.publish(MarketEvent::BookingConfirmed {
            vehicle_id: "v1".into(),
            booking_id: "b1".into(),
        });
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(MarketEvent::NewBid {
            vehicle_id: "v1".into(),
            amount: 500,
        })
        .unwrap();
        assert_eq!(json["type"], "new_bid");
        assert_eq!(json["vehicle_id"], "v1");
        assert_eq!(json["amount"], 500);
    }
}
