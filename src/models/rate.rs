use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown while no usable rate is known.
pub const NO_RATE: &str = "--";

/// Latest conversion rate held by a badge. Overwritten on every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: String,
    pub quote: String,
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base: impl Into<String>, quote: impl Into<String>, value: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            value,
            fetched_at,
        }
    }

    pub fn formatted(&self) -> String {
        format_rate(self.value)
    }

    /// Converts an amount of `base` into `quote`.
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.value
    }
}

/// Formats a rate with a precision that depends on its magnitude:
/// 4 decimals from 1 upwards, 6 down to 0.01, 8 below that.
pub fn format_rate(rate: f64) -> String {
    if !rate.is_finite() || rate <= 0.0 {
        return NO_RATE.to_string();
    }

    if rate >= 1.0 {
        format!("{:.4}", rate)
    } else if rate >= 0.01 {
        format!("{:.6}", rate)
    } else {
        format!("{:.8}", rate)
    }
}
