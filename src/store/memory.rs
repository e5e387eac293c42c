use crate::core::article::NewsArticle;
use crate::core::error::Result;
use crate::core::rate::{Currency, ExchangeRate, rate_key};
use crate::store::{ArticleStore, RateStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// In-memory store over ordered maps, matching the disk store's key layout.
/// Used by engine tests; not durable.
#[derive(Default)]
pub struct MemoryStore {
    rates: Mutex<BTreeMap<String, ExchangeRate>>,
    articles: Mutex<BTreeMap<String, NewsArticle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn get_rate(&self, day: NaiveDate, currency: Currency) -> Result<Option<ExchangeRate>> {
        let rates = self.rates.lock().await;
        Ok(rates.get(&rate_key(day, currency)).cloned())
    }

    async fn rates_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ExchangeRate>> {
        let rates = self.rates.lock().await;
        Ok(rates
            .values()
            .filter(|r| start <= r.day && r.day <= end)
            .cloned()
            .collect())
    }

    async fn upsert_rates(&self, rows: &[ExchangeRate]) -> Result<()> {
        let mut rates = self.rates.lock().await;
        for row in rows {
            rates.insert(row.key(), row.clone());
        }
        Ok(())
    }

    async fn all_rates(&self) -> Result<Vec<ExchangeRate>> {
        let rates = self.rates.lock().await;
        Ok(rates.values().cloned().collect())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn contains_url(&self, url: &str) -> Result<bool> {
        let articles = self.articles.lock().await;
        Ok(articles.contains_key(url))
    }

    async fn insert_article(&self, article: &NewsArticle) -> Result<bool> {
        let mut articles = self.articles.lock().await;
        if articles.contains_key(&article.url) {
            return Ok(false);
        }
        articles.insert(article.url.clone(), article.clone());
        Ok(true)
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<NewsArticle>> {
        let mut rows = self.all_articles().await?;
        rows.truncate(limit);
        Ok(rows)
    }

    async fn all_articles(&self) -> Result<Vec<NewsArticle>> {
        let articles = self.articles.lock().await;
        let mut rows: Vec<NewsArticle> = articles.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.url.cmp(&b.url)));
        Ok(rows)
    }
}
