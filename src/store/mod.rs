//! Durable keyed storage for the two entity tables.
//!
//! The engines treat storage as a collaborator with a minimal contract:
//! point lookups, calendar-ordered range scans, and atomic upsert by unique
//! key. `disk` is the production implementation over a fjall keyspace;
//! `memory` is the drop-in twin the engine tests run against.

pub mod disk;
pub mod memory;

use crate::core::article::NewsArticle;
use crate::core::error::Result;
use crate::core::rate::{Currency, ExchangeRate};
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Point lookup by the (day, currency) unique key.
    async fn get_rate(&self, day: NaiveDate, currency: Currency) -> Result<Option<ExchangeRate>>;

    /// Rows within the inclusive day range, oldest day first.
    async fn rates_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ExchangeRate>>;

    /// Commits every row or none. A row replaces any stored row with the
    /// same (day, currency) key, so replaying a batch is idempotent.
    async fn upsert_rates(&self, rows: &[ExchangeRate]) -> Result<()>;

    /// Every stored rate, oldest day first.
    async fn all_rates(&self) -> Result<Vec<ExchangeRate>>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn contains_url(&self, url: &str) -> Result<bool>;

    /// Inserts unless the URL is already stored. Returns whether a new row
    /// was written; an already-known URL is a skip, never an update.
    async fn insert_article(&self, article: &NewsArticle) -> Result<bool>;

    /// Up to `limit` articles, newest first by creation time.
    async fn recent_articles(&self, limit: usize) -> Result<Vec<NewsArticle>>;

    /// Every stored article, newest first.
    async fn all_articles(&self) -> Result<Vec<NewsArticle>>;
}
