#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use egi_widgets::api::{CollectionSource, RateSource, ALGO};
use egi_widgets::config::{ComponentSpec, Config};
use egi_widgets::models::{CurrentCollection, ExchangeRate};
use egi_widgets::{Error, Result};

/// Rate source replaying a script of outcomes. `None` is a network failure;
/// once the script runs out every call returns `fallback`.
pub struct ScriptedRateSource {
    script: Mutex<VecDeque<Option<f64>>>,
    fallback: Mutex<Option<f64>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedRateSource {
    pub fn new(script: Vec<Option<f64>>, fallback: Option<f64>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn set_fallback(&self, outcome: Option<f64>) {
        *self.fallback.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateSource for ScriptedRateSource {
    async fn fetch_rate(&self, base: &str) -> Result<ExchangeRate> {
        self.calls.lock().unwrap().push(Instant::now());
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| *self.fallback.lock().unwrap());
        match outcome {
            Some(value) => Ok(ExchangeRate::new(base, ALGO, value, Utc::now())),
            None => Err(Error::InvalidResponse("network unreachable".into())),
        }
    }
}

pub struct FixedCollectionSource(pub Option<CurrentCollection>);

#[async_trait]
impl CollectionSource for FixedCollectionSource {
    async fn current_collection(&self) -> Result<Option<CurrentCollection>> {
        Ok(self.0.clone())
    }
}

pub fn config_with(components: Vec<ComponentSpec>) -> Config {
    Config {
        components,
        ..Config::default()
    }
}
