use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::api::RateSource;
use crate::bus::{EventBus, WidgetEvent};
use crate::config::RateBadgeConfig;
use crate::error::Error;
use crate::models::rate::{format_rate, ExchangeRate, NO_RATE};
use crate::widgets::{wait_until, WidgetTask};

/// Text shown in place of the rate after a failed fetch.
pub const ERROR_GLYPH: &str = "ERR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStatus {
    Loading,
    Live,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateBadgeView {
    pub status: BadgeStatus,
    pub text: String,
    /// The value changed from a previously shown one; render with a transition.
    pub animate: bool,
    /// False once the badge halted after exhausting its retries or on logout.
    pub polling: bool,
    pub rate: Option<ExchangeRate>,
}

impl Default for RateBadgeView {
    fn default() -> Self {
        Self {
            status: BadgeStatus::Loading,
            text: NO_RATE.to_string(),
            animate: false,
            polling: false,
            rate: None,
        }
    }
}

/// When the badge wants its next fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPoll {
    Now,
    After(Duration),
    Halt,
}

impl NextPoll {
    fn deadline(self) -> Option<Instant> {
        match self {
            NextPoll::Now => Some(Instant::now()),
            NextPoll::After(delay) => Some(Instant::now() + delay),
            NextPoll::Halt => None,
        }
    }
}

/// Live `base` → ALGO rate badge.
///
/// The badge owns a single schedule: a regular poll every `poll_interval`,
/// replaced by backoff delays (`retry_base_delay * 2^(n-1)`) while failures
/// accumulate. Once `max_retries` retries have failed the badge halts until
/// `on_currency_changed` restarts it, with a fetch that skips any cached rate.
#[derive(Debug, Clone)]
pub struct RateBadge {
    id: String,
    config: RateBadgeConfig,
    retry_count: u32,
    halted: bool,
    refresh_pending: bool,
    view: RateBadgeView,
}

impl RateBadge {
    pub fn new(id: impl Into<String>, config: RateBadgeConfig) -> Self {
        Self {
            id: id.into(),
            config,
            retry_count: 0,
            halted: false,
            refresh_pending: false,
            view: RateBadgeView::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base(&self) -> &str {
        &self.config.base
    }

    pub fn view(&self) -> &RateBadgeView {
        &self.view
    }

    pub fn current(&self) -> Option<&ExchangeRate> {
        self.view.rate.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn start(&mut self) -> NextPoll {
        self.retry_count = 0;
        self.halted = false;
        self.view.polling = true;
        NextPoll::Now
    }

    /// Marks the badge as loading. Returns true when this fetch must skip
    /// cached rates.
    pub fn begin_fetch(&mut self) -> bool {
        self.view.status = BadgeStatus::Loading;
        self.view.animate = false;
        std::mem::take(&mut self.refresh_pending)
    }

    /// Applies a fetched rate and returns the next schedule with the
    /// notification to publish.
    pub fn on_success(&mut self, rate: ExchangeRate) -> (NextPoll, WidgetEvent) {
        let formatted = format_rate(rate.value);
        let changed = self
            .view
            .rate
            .as_ref()
            .map(|previous| previous.value != rate.value)
            .unwrap_or(false);

        let event = WidgetEvent::RateUpdated {
            badge_id: self.id.clone(),
            rate: rate.value,
            formatted: formatted.clone(),
            timestamp: rate.fetched_at,
        };

        self.retry_count = 0;
        self.view.status = BadgeStatus::Live;
        self.view.text = formatted;
        self.view.animate = changed;
        self.view.rate = Some(rate);

        (NextPoll::After(self.config.poll_interval()), event)
    }

    pub fn on_failure(&mut self, err: &Error) -> NextPoll {
        self.show_error();
        self.retry_count += 1;

        if self.retry_count <= self.config.max_retries {
            let delay = backoff_delay(self.config.retry_base_delay(), self.retry_count);
            warn!(
                "Rate fetch for {} failed ({}), retrying in {:?} (attempt {}/{})",
                self.id, err, delay, self.retry_count, self.config.max_retries
            );
            NextPoll::After(delay)
        } else {
            error!("Max retries reached for {}, stopping automatic updates: {}", self.id, err);
            self.halt()
        }
    }

    pub fn on_currency_changed(&mut self) -> NextPoll {
        self.refresh_pending = true;
        self.start()
    }

    pub fn on_logout(&mut self) -> NextPoll {
        self.show_error();
        self.halt()
    }

    fn show_error(&mut self) {
        self.view.status = BadgeStatus::Error;
        self.view.text = ERROR_GLYPH.to_string();
        self.view.animate = false;
    }

    fn halt(&mut self) -> NextPoll {
        self.halted = true;
        self.view.polling = false;
        NextPoll::Halt
    }
}

/// Delay before retry number `attempt` (1-based): base, 2×base, 4×base, …
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor)
}

struct RateBadgeTask {
    badge: RateBadge,
    source: Arc<dyn RateSource>,
    bus: EventBus,
    events: broadcast::Receiver<WidgetEvent>,
    view_tx: watch::Sender<RateBadgeView>,
    shutdown: watch::Receiver<bool>,
}

/// Runs `badge` on its own task. The bus subscription is taken before this
/// returns, so events published afterwards are never missed.
pub fn spawn(badge: RateBadge, source: Arc<dyn RateSource>, bus: &EventBus) -> WidgetTask<RateBadgeView> {
    let (view_tx, view_rx) = watch::channel(badge.view().clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = RateBadgeTask {
        badge,
        source,
        bus: bus.clone(),
        events: bus.subscribe(),
        view_tx,
        shutdown: shutdown_rx,
    };
    let join = tokio::spawn(task.run());

    WidgetTask::new(view_rx, shutdown_tx, join)
}

impl RateBadgeTask {
    async fn run(mut self) {
        info!("Rate badge {} started", self.badge.id());
        let mut deadline = self.badge.start().deadline();
        self.publish_view();

        loop {
            tokio::select! {
                _ = wait_until(deadline) => {
                    deadline = self.poll().await;
                }
                event = self.events.recv() => match event {
                    Ok(WidgetEvent::CurrencyChanged { currency }) => {
                        info!("Currency changed to {}, refreshing {}", currency, self.badge.id());
                        deadline = self.badge.on_currency_changed().deadline();
                        self.publish_view();
                    }
                    Ok(WidgetEvent::UserLogout) => {
                        info!("User logged out, stopping {}", self.badge.id());
                        deadline = self.badge.on_logout().deadline();
                        self.publish_view();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Rate badge {} skipped {} bus events", self.badge.id(), skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = self.shutdown.changed() => break,
            }
        }

        info!("Rate badge {} stopped", self.badge.id());
    }

    async fn poll(&mut self) -> Option<Instant> {
        let refresh = self.badge.begin_fetch();
        self.publish_view();

        let base = self.badge.base().to_string();
        let fetched = if refresh {
            self.source.refresh_rate(&base).await
        } else {
            self.source.fetch_rate(&base).await
        };
        let next = match fetched {
            Ok(rate) => {
                debug!("Rate for {}: {} {}", self.badge.id(), rate.value, rate.quote);
                let (next, event) = self.badge.on_success(rate);
                self.publish_view();
                self.bus.publish(event);
                next
            }
            Err(e) => {
                let next = self.badge.on_failure(&e);
                self.publish_view();
                next
            }
        };
        next.deadline()
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.badge.view().clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CachedRateSource, MockRateSource, ALGO};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn badge() -> RateBadge {
        RateBadge::new("header-rate", RateBadgeConfig::default())
    }

    fn rate(value: f64) -> ExchangeRate {
        ExchangeRate::new("EUR", ALGO, value, Utc::now())
    }

    fn network_error() -> Error {
        Error::InvalidResponse("connection refused".into())
    }

    #[test]
    fn success_renders_rate_and_schedules_interval() {
        let mut badge = badge();
        assert_eq!(badge.start(), NextPoll::Now);

        let (next, event) = badge.on_success(rate(5.0));
        assert_eq!(next, NextPoll::After(Duration::from_secs(30)));
        assert_eq!(badge.view().text, "5.0000");
        assert_eq!(badge.view().status, BadgeStatus::Live);
        assert!(!badge.view().animate);
        match event {
            WidgetEvent::RateUpdated { badge_id, rate, formatted, .. } => {
                assert_eq!(badge_id, "header-rate");
                assert_eq!(rate, 5.0);
                assert_eq!(formatted, "5.0000");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn changed_value_is_animated() {
        let mut badge = badge();
        badge.start();
        badge.on_success(rate(5.0));
        badge.on_success(rate(5.0));
        assert!(!badge.view().animate);
        badge.on_success(rate(0.5));
        assert!(badge.view().animate);
        assert_eq!(badge.view().text, "0.500000");
    }

    #[test]
    fn failures_back_off_then_halt() {
        let mut badge = badge();
        badge.start();

        assert_eq!(badge.on_failure(&network_error()), NextPoll::After(Duration::from_secs(2)));
        assert_eq!(badge.view().text, ERROR_GLYPH);
        assert_eq!(badge.view().status, BadgeStatus::Error);
        assert_eq!(badge.on_failure(&network_error()), NextPoll::After(Duration::from_secs(4)));
        assert_eq!(badge.on_failure(&network_error()), NextPoll::After(Duration::from_secs(8)));
        assert!(!badge.is_halted());

        assert_eq!(badge.on_failure(&network_error()), NextPoll::Halt);
        assert!(badge.is_halted());
        assert!(!badge.view().polling);
        assert_eq!(badge.view().text, ERROR_GLYPH);
    }

    #[test]
    fn success_resets_retry_counter() {
        let mut badge = badge();
        badge.start();
        badge.on_failure(&network_error());
        badge.on_failure(&network_error());
        badge.on_success(rate(1.5));
        assert_eq!(badge.retry_count(), 0);
        assert_eq!(badge.on_failure(&network_error()), NextPoll::After(Duration::from_secs(2)));
    }

    #[test]
    fn currency_change_restarts_halted_badge() {
        let mut badge = badge();
        badge.start();
        for _ in 0..4 {
            badge.on_failure(&network_error());
        }
        assert!(badge.is_halted());

        assert_eq!(badge.on_currency_changed(), NextPoll::Now);
        assert!(!badge.is_halted());
        assert!(badge.view().polling);
        assert_eq!(badge.retry_count(), 0);
    }

    #[test]
    fn only_the_fetch_after_a_currency_change_is_a_refresh() {
        let mut badge = badge();
        badge.start();
        assert!(!badge.begin_fetch());

        badge.on_currency_changed();
        assert!(badge.begin_fetch());
        badge.on_success(rate(5.0));
        assert!(!badge.begin_fetch());
    }

    #[test]
    fn logout_halts_with_error_marker() {
        let mut badge = badge();
        badge.start();
        badge.on_success(rate(2.0));
        assert_eq!(badge.on_logout(), NextPoll::Halt);
        assert_eq!(badge.view().status, BadgeStatus::Error);
        assert!(!badge.view().polling);
    }

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_network_retries_three_times_then_resumes_on_currency_change() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let healthy = Arc::new(AtomicBool::new(false));

        let mut source = MockRateSource::new();
        let recorded = calls.clone();
        let up = healthy.clone();
        let respond = move |base: &str| -> crate::error::Result<ExchangeRate> {
            recorded.lock().unwrap().push(Instant::now());
            if up.load(Ordering::SeqCst) {
                Ok(ExchangeRate::new(base, ALGO, 5.0, Utc::now()))
            } else {
                Err(Error::InvalidResponse("connection refused".into()))
            }
        };
        source.expect_fetch_rate().returning(respond.clone());
        source.expect_refresh_rate().returning(respond);

        let bus = EventBus::default();
        let task = spawn(badge(), Arc::new(source), &bus);

        let halted = task.wait_for(|view| !view.polling && view.status == BadgeStatus::Error).await;
        assert!(halted.is_some());

        let gaps: Vec<Duration> = {
            let calls = calls.lock().unwrap();
            calls.windows(2).map(|pair| pair[1] - pair[0]).collect()
        };
        assert_eq!(
            gaps,
            vec![Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)]
        );

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(calls.lock().unwrap().len(), 4);

        healthy.store(true, Ordering::SeqCst);
        bus.publish(WidgetEvent::CurrencyChanged {
            currency: "EUR".to_string(),
        });
        let live = task.wait_for(|view| view.status == BadgeStatus::Live).await.unwrap();
        assert_eq!(live.text, "5.0000");
        assert!(live.polling);
        assert_eq!(calls.lock().unwrap().len(), 5);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(calls.lock().unwrap().len(), 6);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn currency_change_reaches_backend_through_rate_cache() {
        let backend_calls = Arc::new(AtomicUsize::new(0));
        let mut inner = MockRateSource::new();
        let counted = backend_calls.clone();
        let respond = move |base: &str| -> crate::error::Result<ExchangeRate> {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(ExchangeRate::new(base, ALGO, 5.0, Utc::now()))
        };
        inner.expect_fetch_rate().returning(respond.clone());
        inner.expect_refresh_rate().returning(respond);

        let source = CachedRateSource::new(inner, Duration::from_secs(300));
        let bus = EventBus::default();
        let task = spawn(badge(), Arc::new(source), &bus);
        task.wait_for(|view| view.status == BadgeStatus::Live).await.unwrap();
        assert_eq!(backend_calls.load(Ordering::SeqCst), 1);

        bus.publish(WidgetEvent::CurrencyChanged {
            currency: "EUR".to_string(),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend_calls.load(Ordering::SeqCst), 2);
        assert_eq!(task.snapshot().text, "5.0000");

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn successful_fetch_is_broadcast() {
        let mut source = MockRateSource::new();
        source
            .expect_fetch_rate()
            .returning(|base| Ok(ExchangeRate::new(base, ALGO, 0.004, Utc::now())));

        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let task = spawn(badge(), Arc::new(source), &bus);

        match events.recv().await.unwrap() {
            WidgetEvent::RateUpdated { formatted, .. } => assert_eq!(formatted, "0.00400000"),
            other => panic!("unexpected event {:?}", other),
        }
        task.stop().await;
    }
}
