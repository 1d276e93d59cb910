use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::widgets::carousel::CarouselConfig;

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "EGI_API_BASE_URL";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rate_badge: RateBadgeConfig,
    pub collection_badge: CollectionBadgeConfig,
    pub modal: ModalConfig,
    pub components: Vec<ComponentSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Zero disables the rate cache.
    pub rate_cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 10,
            rate_cache_ttl_secs: 0,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RateBadgeConfig {
    pub base: String,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RateBadgeConfig {
    fn default() -> Self {
        Self {
            base: "EUR".to_string(),
            poll_interval_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 2_000,
        }
    }
}

impl RateBadgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionBadgeConfig {
    pub poll_interval_secs: u64,
    pub show_when_empty: bool,
}

impl Default for CollectionBadgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 120,
            show_when_empty: false,
        }
    }
}

impl CollectionBadgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModalConfig {
    pub open_transition_ms: u64,
    pub close_transition_ms: u64,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            open_transition_ms: 150,
            close_transition_ms: 300,
        }
    }
}

impl ModalConfig {
    pub fn open_transition(&self) -> Duration {
        Duration::from_millis(self.open_transition_ms)
    }

    pub fn close_transition(&self) -> Duration {
        Duration::from_millis(self.close_transition_ms)
    }
}

/// A component declared in the config file, mounted by `WidgetHost::init`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentSpec {
    RateBadge {
        id: String,
    },
    CollectionBadge {
        id: String,
    },
    PriceDisplay {
        id: String,
        amount_eur: f64,
    },
    Carousel {
        id: String,
        item_count: usize,
        #[serde(default)]
        viewport_width: Option<f32>,
        #[serde(default)]
        settings: CarouselConfig,
    },
    Modal {
        id: String,
        #[serde(default)]
        focusables: Vec<String>,
    },
}

impl ComponentSpec {
    pub fn id(&self) -> &str {
        match self {
            ComponentSpec::RateBadge { id }
            | ComponentSpec::CollectionBadge { id }
            | ComponentSpec::PriceDisplay { id, .. }
            | ComponentSpec::Carousel { id, .. }
            | ComponentSpec::Modal { id, .. } => id,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Lifetime of a cached rate. Kept under the badge poll interval so each
    /// regular poll reaches the backend; `None` disables the cache.
    pub fn rate_cache_ttl(&self) -> Option<Duration> {
        let ceiling = self.rate_badge.poll_interval().saturating_sub(Duration::from_secs(1));
        let ttl = Duration::from_secs(self.api.rate_cache_ttl_secs).min(ceiling);
        (!ttl.is_zero()).then_some(ttl)
    }

    /// Applies `EGI_API_BASE_URL` when it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }
}
