use crate::core::article::NewsArticle;
use crate::core::error::{Error, Result};
use crate::core::rate::{Currency, ExchangeRate, rate_key};
use crate::store::{ArticleStore, RateStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};
use tracing::debug;

const RATES_PARTITION: &str = "rates";
const ARTICLES_PARTITION: &str = "articles";

/// Persistent store over a fjall keyspace, one partition per entity table.
///
/// Rate keys are `"YYYY-MM-DD/CCY"` so the partition's lexicographic order
/// is calendar order and range scans need no sorting. Article keys are the
/// URL itself. Values are serde_json-encoded rows.
pub struct DiskStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
    articles: PartitionHandle,
    path: PathBuf,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::store(format!("cannot create {}: {e}", path.display())))?;

        let keyspace = fjall::Config::new(path).open()?;
        let rates = keyspace.open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        let articles =
            keyspace.open_partition(ARTICLES_PARTITION, PartitionCreateOptions::default())?;

        Ok(DiskStore {
            keyspace,
            rates,
            articles,
            path: path.to_path_buf(),
        })
    }

    /// Directory backing the keyspace; the raw backup mode copies it.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the keyspace so the backing directory on disk is current.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl RateStore for DiskStore {
    async fn get_rate(&self, day: NaiveDate, currency: Currency) -> Result<Option<ExchangeRate>> {
        match self.rates.get(rate_key(day, currency))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn rates_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ExchangeRate>> {
        // "YYYY-MM-DD/CCY" sorts after the bare day string, so the day after
        // `end` is a strict upper bound covering every currency on `end`.
        let lower = start.to_string();
        let upper = end
            .succ_opt()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "9999-12-31".to_string());

        let mut rows = Vec::new();
        for item in self.rates.range(lower..upper) {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    async fn upsert_rates(&self, rows: &[ExchangeRate]) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for row in rows {
            batch.insert(&self.rates, row.key(), serde_json::to_vec(row)?);
        }
        batch.commit()?;
        debug!("Committed {} rate upserts", rows.len());
        Ok(())
    }

    async fn all_rates(&self) -> Result<Vec<ExchangeRate>> {
        let mut rows = Vec::new();
        for item in self.rates.iter() {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ArticleStore for DiskStore {
    async fn contains_url(&self, url: &str) -> Result<bool> {
        Ok(self.articles.contains_key(url)?)
    }

    async fn insert_article(&self, article: &NewsArticle) -> Result<bool> {
        if self.articles.contains_key(&article.url)? {
            debug!(url = %article.url, "Skipping already-stored article");
            return Ok(false);
        }
        self.articles
            .insert(&article.url, serde_json::to_vec(article)?)?;
        Ok(true)
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<NewsArticle>> {
        let mut rows = self.all_articles().await?;
        rows.truncate(limit);
        Ok(rows)
    }

    async fn all_articles(&self) -> Result<Vec<NewsArticle>> {
        let mut rows: Vec<NewsArticle> = Vec::new();
        for item in self.articles.iter() {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        // Keys order by URL; readers and exports want newest first.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.url.cmp(&b.url)));
        Ok(rows)
    }
}
