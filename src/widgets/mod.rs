//! Headless widgets. Each widget is a state machine exposing a plain view
//! value; the polling ones also come with a tokio task that drives them.

use log::error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

pub mod carousel;
pub mod collection_badge;
pub mod modal;
pub mod price_display;
pub mod rate_badge;

pub use carousel::{Carousel, CarouselConfig, CarouselStep, CarouselView};
pub use collection_badge::{CollectionBadge, CollectionBadgeView};
pub use modal::{Modal, ModalKey, ModalState};
pub use price_display::{PriceDisplay, PriceDisplayView};
pub use rate_badge::{BadgeStatus, NextPoll, RateBadge, RateBadgeView};

/// Handle to a running widget task. Dropping it also stops the task.
#[derive(Debug)]
pub struct WidgetTask<V> {
    view: watch::Receiver<V>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl<V: Clone> WidgetTask<V> {
    pub(crate) fn new(view: watch::Receiver<V>, shutdown: watch::Sender<bool>, join: JoinHandle<()>) -> Self {
        Self { view, shutdown, join }
    }

    pub fn snapshot(&self) -> V {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<V> {
        self.view.clone()
    }

    /// Resolves with the first view matching `pred`, or `None` once the task is gone.
    pub async fn wait_for(&self, mut pred: impl FnMut(&V) -> bool) -> Option<V> {
        let mut rx = self.view.clone();
        loop {
            {
                let view = rx.borrow_and_update();
                if pred(&*view) {
                    return Some(view.clone());
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            if !e.is_cancelled() {
                error!("Widget task ended abnormally: {}", e);
            }
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
