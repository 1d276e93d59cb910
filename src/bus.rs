//! In-process pub/sub bus that carries notifications between widgets.
//!
//! Publishing is fire-and-forget: a message with no subscribers is dropped,
//! and subscribers that fall behind skip what they missed. There is no
//! ordering guarantee across subscribers.

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::broadcast;

use crate::models::CurrentCollection;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// The user picked another display currency. Restarts halted rate badges.
    CurrencyChanged { currency: String },
    RateUpdated {
        badge_id: String,
        rate: f64,
        formatted: String,
        timestamp: DateTime<Utc>,
    },
    UserLogout,
    CollectionChanged(CurrentCollection),
    CollectionUpdated(CurrentCollection),
    CollectionBadgeClicked {
        badge_id: String,
        collection_id: Option<u64>,
        can_edit: bool,
    },
    ModalOpened { modal_id: String },
    ModalClosed { modal_id: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WidgetEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: WidgetEvent) {
        debug!("Publishing {:?}", event);
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
