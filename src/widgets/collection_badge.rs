use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::api::CollectionSource;
use crate::bus::{EventBus, WidgetEvent};
use crate::config::CollectionBadgeConfig;
use crate::models::CurrentCollection;
use crate::widgets::{wait_until, WidgetTask};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionBadgeView {
    pub visible: bool,
    pub collection_id: Option<u64>,
    pub name: Option<String>,
    pub egi_count: u32,
    pub can_edit: bool,
    pub link: Option<String>,
    /// The EGI count changed on the last update.
    pub pulse: bool,
}

/// Badge showing the user's current collection.
#[derive(Debug, Clone)]
pub struct CollectionBadge {
    id: String,
    show_when_empty: bool,
    view: CollectionBadgeView,
}

impl CollectionBadge {
    pub fn new(id: impl Into<String>, show_when_empty: bool) -> Self {
        Self {
            id: id.into(),
            show_when_empty,
            view: CollectionBadgeView {
                visible: show_when_empty,
                ..CollectionBadgeView::default()
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view(&self) -> &CollectionBadgeView {
        &self.view
    }

    /// Replaces the shown collection. Returns whether the EGI count changed.
    pub fn apply(&mut self, collection: Option<&CurrentCollection>) -> bool {
        let previous_count = self.view.egi_count;

        self.view = match collection {
            Some(collection) => CollectionBadgeView {
                visible: (collection.id != 0 && !collection.name.is_empty()) || self.show_when_empty,
                collection_id: Some(collection.id),
                name: Some(collection.name.clone()).filter(|name| !name.is_empty()),
                egi_count: collection.egi_count,
                can_edit: collection.can_edit,
                link: Some(collection.link()),
                pulse: false,
            },
            None => CollectionBadgeView {
                visible: self.show_when_empty,
                ..CollectionBadgeView::default()
            },
        };

        let changed = previous_count != self.view.egi_count;
        self.view.pulse = changed;
        changed
    }

    /// Applies a bus event addressed to this badge. Returns whether it was handled.
    pub fn on_event(&mut self, event: &WidgetEvent) -> bool {
        match event {
            WidgetEvent::CollectionChanged(collection) => {
                self.apply(Some(collection));
                true
            }
            WidgetEvent::CollectionUpdated(collection) if self.view.collection_id == Some(collection.id) => {
                self.apply(Some(collection));
                true
            }
            WidgetEvent::UserLogout => {
                self.apply(None);
                true
            }
            _ => false,
        }
    }

    pub fn click(&self) -> WidgetEvent {
        WidgetEvent::CollectionBadgeClicked {
            badge_id: self.id.clone(),
            collection_id: self.view.collection_id,
            can_edit: self.view.can_edit,
        }
    }
}

struct CollectionBadgeTask {
    badge: CollectionBadge,
    source: Arc<dyn CollectionSource>,
    poll_interval: Duration,
    events: broadcast::Receiver<WidgetEvent>,
    view_tx: watch::Sender<CollectionBadgeView>,
    shutdown: watch::Receiver<bool>,
}

pub fn spawn(
    badge: CollectionBadge,
    config: &CollectionBadgeConfig,
    source: Arc<dyn CollectionSource>,
    bus: &EventBus,
) -> WidgetTask<CollectionBadgeView> {
    let (view_tx, view_rx) = watch::channel(badge.view().clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = CollectionBadgeTask {
        badge,
        source,
        poll_interval: config.poll_interval(),
        events: bus.subscribe(),
        view_tx,
        shutdown: shutdown_rx,
    };
    let join = tokio::spawn(task.run());

    WidgetTask::new(view_rx, shutdown_tx, join)
}

impl CollectionBadgeTask {
    async fn run(mut self) {
        info!("Collection badge {} started", self.badge.id());
        let mut deadline = Some(Instant::now());

        loop {
            tokio::select! {
                _ = wait_until(deadline) => {
                    self.refresh().await;
                    deadline = Some(Instant::now() + self.poll_interval);
                }
                event = self.events.recv() => match event {
                    Ok(event) => {
                        if self.badge.on_event(&event) {
                            self.publish_view();
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Collection badge {} skipped {} bus events", self.badge.id(), skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = self.shutdown.changed() => break,
            }
        }

        info!("Collection badge {} stopped", self.badge.id());
    }

    async fn refresh(&mut self) {
        match self.source.current_collection().await {
            Ok(collection) => {
                if self.badge.apply(collection.as_ref()) {
                    debug!("EGI count changed on {}", self.badge.id());
                }
                self.publish_view();
            }
            Err(e) => {
                warn!("Failed to refresh collection for {}: {}", self.badge.id(), e);
            }
        }
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.badge.view().clone());
    }
}
