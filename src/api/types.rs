use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{CurrentCollection, ExchangeRate};

/// Body of `GET /api/currency/rate/{base}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<RateData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateData {
    #[serde(default)]
    pub rate_to_algo: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RateResponse {
    pub fn into_exchange_rate(self, base: &str, quote: &str) -> Result<ExchangeRate> {
        if !self.success {
            return Err(Error::InvalidResponse("rate endpoint reported failure".into()));
        }
        let data = self
            .data
            .ok_or_else(|| Error::InvalidResponse("missing rate data".into()))?;

        let fetched_at = match data.timestamp.as_deref() {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!("Unparseable rate timestamp {:?}: {}", raw, e);
                    Utc::now()
                }
            },
            None => Utc::now(),
        };

        Ok(ExchangeRate::new(
            base.to_uppercase(),
            quote,
            data.rate_to_algo.unwrap_or_default(),
            fetched_at,
        ))
    }
}

/// Body of `GET /api/user/current-collection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCollectionResponse {
    #[serde(default)]
    pub collection: Option<CurrentCollection>,
}
