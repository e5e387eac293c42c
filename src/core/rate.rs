//! Exchange-rate abstractions and core types

use crate::core::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// The fixed set of base currencies tracked by a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Jpy];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Jpy => "JPY",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "JPY" => Ok(Currency::Jpy),
            _ => Err(Error::validation(
                "currency",
                format!("unknown currency code: {s}"),
            )),
        }
    }
}

/// One stored observation: 1 unit of `currency` expressed in the quote
/// currency on `day`. The pair (day, currency) is unique; replays overwrite
/// `rate` and bump `updated_at` instead of creating a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub day: NaiveDate,
    pub currency: Currency,
    pub rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Store key, lexicographically ordered by day then currency code.
    pub fn key(&self) -> String {
        rate_key(self.day, self.currency)
    }
}

pub fn rate_key(day: NaiveDate, currency: Currency) -> String {
    format!("{day}/{currency}")
}

/// Inclusive calendar window bounding both fetch and read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `end = today`, `start = end - (days - 1)`. Rejects `days` outside
    /// [2, 60] before any I/O happens.
    pub fn last_days(days: i64, today: NaiveDate) -> Result<Self> {
        if !(2..=60).contains(&days) {
            return Err(Error::validation(
                "days",
                format!("days must be between 2 and 60, got {days}"),
            ));
        }
        Ok(DateWindow {
            start: today - Duration::days(days - 1),
            end: today,
        })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One fetched time series: observed rates for a base currency, keyed by
/// calendar date. An ordered map so iteration is deterministic; non-trading
/// days are simply absent.
#[derive(Debug, Clone)]
pub struct RateSeries {
    pub base: Currency,
    pub points: BTreeMap<NaiveDate, f64>,
}

/// Sort direction for reads. Presentation-only: it never affects which rows
/// are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(Error::validation(
                "order",
                format!("order must be asc or desc, got {s}"),
            )),
        }
    }
}

#[async_trait]
pub trait RateSeriesProvider: Send + Sync {
    /// Fetches the time series for one base currency over the window.
    async fn fetch_series(&self, base: Currency, window: &DateWindow) -> Result<RateSeries>;
}
