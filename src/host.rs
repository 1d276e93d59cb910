//! Component registry keyed by element id.
//!
//! The host owns every mounted widget, the shared event bus and the backend
//! sources. Polling widgets run as tasks and are cancelled on `unmount`;
//! carousels and modals are plain state mutated through the host.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::api::{ApiClient, CachedRateSource, CollectionSource, RateSource};
use crate::bus::{EventBus, WidgetEvent};
use crate::config::{ComponentSpec, Config};
use crate::error::{Error, Result};
use crate::widgets::{
    collection_badge, price_display, rate_badge, Carousel, CollectionBadge, CollectionBadgeView, Modal, ModalKey,
    ModalState, PriceDisplay, PriceDisplayView, RateBadge, RateBadgeView, WidgetTask,
};

pub enum Component {
    RateBadge(WidgetTask<RateBadgeView>),
    CollectionBadge(WidgetTask<CollectionBadgeView>),
    PriceDisplay(WidgetTask<PriceDisplayView>),
    Carousel {
        carousel: Carousel,
        next_tick: Option<Instant>,
    },
    Modal(Modal),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::RateBadge(_) => "rate badge",
            Component::CollectionBadge(_) => "collection badge",
            Component::PriceDisplay(_) => "price display",
            Component::Carousel { .. } => "carousel",
            Component::Modal(_) => "modal",
        }
    }

    async fn teardown(self) {
        match self {
            Component::RateBadge(task) => task.stop().await,
            Component::CollectionBadge(task) => task.stop().await,
            Component::PriceDisplay(task) => task.stop().await,
            Component::Carousel { .. } | Component::Modal(_) => {}
        }
    }
}

pub struct WidgetHost {
    config: Config,
    bus: EventBus,
    rates: Arc<dyn RateSource>,
    collections: Arc<dyn CollectionSource>,
    components: HashMap<String, Component>,
    order: Vec<String>,
}

impl WidgetHost {
    pub fn new(config: Config, rates: Arc<dyn RateSource>, collections: Arc<dyn CollectionSource>) -> Self {
        Self {
            config,
            bus: EventBus::default(),
            rates,
            collections,
            components: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Builds a host talking to the backend described by `config.api`.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = ApiClient::new(&config.api)?;
        let rates: Arc<dyn RateSource> = match config.rate_cache_ttl() {
            Some(ttl) => Arc::new(CachedRateSource::new(client.clone(), ttl)),
            None => Arc::new(client.clone()),
        };
        Ok(Self::new(config, rates, Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn publish(&self, event: WidgetEvent) {
        self.bus.publish(event);
    }

    /// Mounts every component declared in the configuration, in order.
    pub fn init(&mut self) -> Result<usize> {
        let specs = self.config.components.clone();
        for spec in &specs {
            self.mount(spec.clone())?;
        }
        info!("Mounted {} declared components", specs.len());
        Ok(specs.len())
    }

    pub fn mount(&mut self, spec: ComponentSpec) -> Result<()> {
        let id = spec.id().to_string();
        if self.components.contains_key(&id) {
            return Err(Error::DuplicateComponent(id));
        }

        let component = match spec {
            ComponentSpec::RateBadge { id } => {
                let badge = RateBadge::new(id, self.config.rate_badge.clone());
                Component::RateBadge(rate_badge::spawn(badge, self.rates.clone(), &self.bus))
            }
            ComponentSpec::CollectionBadge { id } => {
                let badge = CollectionBadge::new(id, self.config.collection_badge.show_when_empty);
                Component::CollectionBadge(collection_badge::spawn(
                    badge,
                    &self.config.collection_badge,
                    self.collections.clone(),
                    &self.bus,
                ))
            }
            ComponentSpec::PriceDisplay { id, amount_eur } => {
                Component::PriceDisplay(price_display::spawn(PriceDisplay::new(id, amount_eur), &self.bus))
            }
            ComponentSpec::Carousel {
                item_count,
                viewport_width,
                settings,
                ..
            } => {
                let next_tick = settings.auto_advance().map(|every| Instant::now() + every);
                let mut carousel = Carousel::new(settings, item_count);
                if let Some(width) = viewport_width {
                    carousel.resize(width);
                }
                Component::Carousel { carousel, next_tick }
            }
            ComponentSpec::Modal { id, focusables } => Component::Modal(Modal::new(id, focusables)),
        };

        debug!("Mounted {} {}", component.kind(), id);
        self.order.push(id.clone());
        self.components.insert(id, component);
        Ok(())
    }

    /// Removes a component, cancelling its task if it has one.
    pub async fn unmount(&mut self, id: &str) -> Result<()> {
        let component = self
            .components
            .remove(id)
            .ok_or_else(|| Error::UnknownComponent(id.to_string()))?;
        self.order.retain(|mounted| mounted != id);
        component.teardown().await;
        debug!("Unmounted {}", id);
        Ok(())
    }

    /// Unmounts everything, most recently mounted first.
    pub async fn shutdown(&mut self) {
        let ids: Vec<String> = self.order.iter().rev().cloned().collect();
        for id in ids {
            let _ = self.unmount(&id).await;
        }
        info!("Widget host shut down");
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    fn get(&self, id: &str) -> Result<&Component> {
        self.components
            .get(id)
            .ok_or_else(|| Error::UnknownComponent(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Component> {
        self.components
            .get_mut(id)
            .ok_or_else(|| Error::UnknownComponent(id.to_string()))
    }

    pub fn rate_badge(&self, id: &str) -> Result<&WidgetTask<RateBadgeView>> {
        match self.get(id)? {
            Component::RateBadge(task) => Ok(task),
            _ => Err(wrong_kind(id, "rate badge")),
        }
    }

    pub fn collection_badge(&self, id: &str) -> Result<&WidgetTask<CollectionBadgeView>> {
        match self.get(id)? {
            Component::CollectionBadge(task) => Ok(task),
            _ => Err(wrong_kind(id, "collection badge")),
        }
    }

    pub fn price_display(&self, id: &str) -> Result<&WidgetTask<PriceDisplayView>> {
        match self.get(id)? {
            Component::PriceDisplay(task) => Ok(task),
            _ => Err(wrong_kind(id, "price display")),
        }
    }

    pub fn carousel(&self, id: &str) -> Result<&Carousel> {
        match self.get(id)? {
            Component::Carousel { carousel, .. } => Ok(carousel),
            _ => Err(wrong_kind(id, "carousel")),
        }
    }

    pub fn carousel_mut(&mut self, id: &str) -> Result<&mut Carousel> {
        match self.get_mut(id)? {
            Component::Carousel { carousel, .. } => Ok(carousel),
            _ => Err(wrong_kind(id, "carousel")),
        }
    }

    /// Ticks every auto-advancing carousel whose deadline has passed.
    /// Returns the ids of the carousels that moved.
    pub fn advance_carousels(&mut self, now: Instant) -> Vec<String> {
        let mut moved = Vec::new();
        for id in &self.order {
            if let Some(Component::Carousel { carousel, next_tick }) = self.components.get_mut(id) {
                let (Some(deadline), Some(every)) = (*next_tick, carousel.config().auto_advance()) else {
                    continue;
                };
                if now >= deadline {
                    if carousel.tick() {
                        moved.push(id.clone());
                    }
                    *next_tick = Some(now + every);
                }
            }
        }
        moved
    }

    /// Earliest pending carousel auto-advance.
    pub fn next_carousel_deadline(&self) -> Option<Instant> {
        self.components
            .values()
            .filter_map(|component| match component {
                Component::Carousel { next_tick, .. } => *next_tick,
                _ => None,
            })
            .min()
    }

    pub fn modal(&self, id: &str) -> Result<&Modal> {
        match self.get(id)? {
            Component::Modal(modal) => Ok(modal),
            _ => Err(wrong_kind(id, "modal")),
        }
    }

    fn modal_mut(&mut self, id: &str) -> Result<&mut Modal> {
        match self.get_mut(id)? {
            Component::Modal(modal) => Ok(modal),
            _ => Err(wrong_kind(id, "modal")),
        }
    }

    /// Opens a modal, closing any other active modal first.
    pub fn open_modal(&mut self, id: &str, previously_focused: Option<String>) -> Result<bool> {
        self.modal(id)?;

        let others: Vec<String> = self
            .components
            .iter()
            .filter_map(|(other, component)| match component {
                Component::Modal(modal) if other != id && modal.is_active() => Some(other.clone()),
                _ => None,
            })
            .collect();
        for other in others {
            self.close_modal(&other)?;
        }

        let opened = self.modal_mut(id)?.open(previously_focused);
        if opened {
            self.bus.publish(WidgetEvent::ModalOpened {
                modal_id: id.to_string(),
            });
        }
        Ok(opened)
    }

    pub fn close_modal(&mut self, id: &str) -> Result<bool> {
        let closed = self.modal_mut(id)?.close();
        if closed {
            self.bus.publish(WidgetEvent::ModalClosed {
                modal_id: id.to_string(),
            });
        }
        Ok(closed)
    }

    /// Routes a key press to a modal. An Escape that starts closing it
    /// publishes `ModalClosed` like `close_modal` does.
    pub fn modal_key(&mut self, id: &str, key: ModalKey) -> Result<bool> {
        let modal = self.modal_mut(id)?;
        let was_active = modal.is_active();
        let consumed = modal.handle_key(key);
        if was_active && modal.state() == ModalState::Closing {
            self.bus.publish(WidgetEvent::ModalClosed {
                modal_id: id.to_string(),
            });
        }
        Ok(consumed)
    }

    pub fn focus_modal(&mut self, id: &str, element: &str) -> Result<bool> {
        Ok(self.modal_mut(id)?.focus(element))
    }

    /// Time left before the modal's pending transition may complete.
    pub fn modal_transition_delay(&self, id: &str) -> Result<Option<Duration>> {
        Ok(match self.modal(id)?.state() {
            ModalState::Opening => Some(self.config.modal.open_transition()),
            ModalState::Closing => Some(self.config.modal.close_transition()),
            ModalState::Open | ModalState::Closed => None,
        })
    }

    /// Waits out the pending transition of a modal and completes it.
    /// Returns the element that should receive focus.
    pub async fn settle_modal(&mut self, id: &str) -> Result<Option<String>> {
        if let Some(delay) = self.modal_transition_delay(id)? {
            tokio::time::sleep(delay).await;
        }
        Ok(self.modal_mut(id)?.finish_transition())
    }
}

fn wrong_kind(id: &str, expected: &'static str) -> Error {
    Error::WrongComponentKind {
        id: id.to_string(),
        expected,
    }
}
