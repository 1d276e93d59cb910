use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How far one `next`/`prev` moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CarouselStep {
    #[default]
    Card,
    Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    pub card_width: f32,
    pub gap: f32,
    pub step: CarouselStep,
    pub wrap: bool,
    pub auto_advance_secs: Option<u64>,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            card_width: 280.0,
            gap: 16.0,
            step: CarouselStep::Card,
            wrap: false,
            auto_advance_secs: None,
        }
    }
}

impl CarouselConfig {
    pub fn auto_advance(&self) -> Option<Duration> {
        self.auto_advance_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarouselView {
    pub index: usize,
    pub items_per_page: usize,
    pub scroll_offset: f32,
    pub controls_visible: bool,
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub page_count: usize,
    pub active_page: usize,
}

/// Horizontal pager over a fixed number of pre-rendered cards.
///
/// `index` is the first visible card and always stays within
/// `0..=item_count - items_per_page`.
#[derive(Debug, Clone)]
pub struct Carousel {
    config: CarouselConfig,
    item_count: usize,
    items_per_page: usize,
    index: usize,
    hovered: bool,
}

impl Carousel {
    pub fn new(config: CarouselConfig, item_count: usize) -> Self {
        Self {
            config,
            item_count,
            items_per_page: 1,
            index: 0,
            hovered: false,
        }
    }

    pub fn config(&self) -> &CarouselConfig {
        &self.config
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn max_index(&self) -> usize {
        self.item_count.saturating_sub(self.items_per_page)
    }

    pub fn has_navigation(&self) -> bool {
        self.item_count > 1 && self.item_count > self.items_per_page
    }

    fn stride(&self) -> usize {
        match self.config.step {
            CarouselStep::Card => 1,
            CarouselStep::Page => self.items_per_page,
        }
    }

    pub fn next(&mut self) {
        if !self.has_navigation() {
            return;
        }
        let max = self.max_index();
        if self.index >= max {
            if self.config.wrap {
                self.index = 0;
            }
        } else {
            self.index = (self.index + self.stride()).min(max);
        }
    }

    pub fn prev(&mut self) {
        if !self.has_navigation() {
            return;
        }
        if self.index == 0 {
            if self.config.wrap {
                self.index = self.max_index();
            }
        } else {
            self.index = self.index.saturating_sub(self.stride());
        }
    }

    /// Moves to `index`, clamped into the valid range.
    pub fn go_to(&mut self, index: usize) {
        self.index = index.min(self.max_index());
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.go_to(page.saturating_mul(self.items_per_page));
    }

    /// Recomputes cards per page for a new viewport width and clamps the index.
    /// A page never holds more cards than the carousel has.
    pub fn resize(&mut self, viewport_width: f32) {
        let slot = self.config.card_width + self.config.gap;
        let fitting = if slot > 0.0 && viewport_width.is_finite() {
            ((viewport_width + self.config.gap) / slot).floor().max(0.0) as usize
        } else {
            1
        };
        self.items_per_page = fitting.clamp(1, self.item_count.max(1));
        self.index = self.index.min(self.max_index());
        debug!(
            "Carousel resized: width={} items_per_page={} index={}",
            viewport_width, self.items_per_page, self.index
        );
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    /// One auto-advance step: a single card forward, back to the start at
    /// the end. Paused while hovered. Returns whether the carousel moved.
    pub fn tick(&mut self) -> bool {
        if self.config.auto_advance_secs.is_none() || self.hovered || !self.has_navigation() {
            return false;
        }
        let max = self.max_index();
        self.index = if self.index >= max { 0 } else { self.index + 1 };
        true
    }

    pub fn scroll_offset(&self) -> f32 {
        self.index as f32 * (self.config.card_width + self.config.gap)
    }

    pub fn page_count(&self) -> usize {
        if self.item_count == 0 {
            0
        } else {
            self.item_count.div_ceil(self.items_per_page)
        }
    }

    pub fn active_page(&self) -> usize {
        if self.item_count == 0 {
            return 0;
        }
        if self.index >= self.max_index() {
            self.page_count() - 1
        } else {
            self.index / self.items_per_page
        }
    }

    pub fn view(&self) -> CarouselView {
        let navigable = self.has_navigation();
        CarouselView {
            index: self.index,
            items_per_page: self.items_per_page,
            scroll_offset: self.scroll_offset(),
            controls_visible: navigable,
            prev_enabled: navigable && (self.config.wrap || self.index > 0),
            next_enabled: navigable && (self.config.wrap || self.index < self.max_index()),
            page_count: self.page_count(),
            active_page: self.active_page(),
        }
    }
}
