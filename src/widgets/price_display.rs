use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use crate::api::ALGO;
use crate::bus::{EventBus, WidgetEvent};
use crate::models::rate::NO_RATE;
use crate::widgets::WidgetTask;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceDisplayView {
    pub amount_eur: f64,
    pub algo: Option<f64>,
    pub text: String,
}

/// A EUR price shown in ALGO, recomputed whenever a rate badge publishes a
/// fresh rate.
#[derive(Debug, Clone)]
pub struct PriceDisplay {
    id: String,
    view: PriceDisplayView,
}

impl PriceDisplay {
    pub fn new(id: impl Into<String>, amount_eur: f64) -> Self {
        Self {
            id: id.into(),
            view: PriceDisplayView {
                amount_eur,
                algo: None,
                text: NO_RATE.to_string(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view(&self) -> &PriceDisplayView {
        &self.view
    }

    pub fn apply_rate(&mut self, rate_to_algo: f64) {
        if !rate_to_algo.is_finite() || rate_to_algo <= 0.0 {
            self.view.algo = None;
            self.view.text = NO_RATE.to_string();
            return;
        }
        let algo = self.view.amount_eur * rate_to_algo;
        self.view.algo = Some(algo);
        self.view.text = format!("{:.2} {}", algo, ALGO);
    }
}

pub fn spawn(display: PriceDisplay, bus: &EventBus) -> WidgetTask<PriceDisplayView> {
    let (view_tx, view_rx) = watch::channel(display.view().clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let events = bus.subscribe();

    let join = tokio::spawn(run(display, events, view_tx, shutdown_rx));
    WidgetTask::new(view_rx, shutdown_tx, join)
}

async fn run(
    mut display: PriceDisplay,
    mut events: broadcast::Receiver<WidgetEvent>,
    view_tx: watch::Sender<PriceDisplayView>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Price display {} started", display.id());
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(WidgetEvent::RateUpdated { rate, .. }) => {
                    display.apply_rate(rate);
                    view_tx.send_replace(display.view().clone());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Price display {} skipped {} bus events", display.id(), skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn converts_with_two_decimals() {
        let mut display = PriceDisplay::new("egi-12-price", 150.0);
        assert_eq!(display.view().text, "--");
        display.apply_rate(4.1234);
        assert_eq!(display.view().text, "618.51 ALGO");
        display.apply_rate(0.0);
        assert_eq!(display.view().text, "--");
        assert_eq!(display.view().algo, None);
    }

    #[tokio::test]
    async fn follows_rate_updates_on_the_bus() {
        let bus = EventBus::default();
        let task = spawn(PriceDisplay::new("egi-12-price", 10.0), &bus);

        bus.publish(WidgetEvent::RateUpdated {
            badge_id: "header-rate".to_string(),
            rate: 5.0,
            formatted: "5.0000".to_string(),
            timestamp: Utc::now(),
        });

        let view = task.wait_for(|view| view.algo.is_some()).await.unwrap();
        assert_eq!(view.text, "50.00 ALGO");
        task.stop().await;
    }
}
