//! News-article abstractions and core types

use crate::core::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article as the upstream feed reports it. Only the fields that are part
/// of the stored schema are kept; everything else is discarded on
/// deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArticle {
    pub url: Option<String>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub seendate: Option<String>,
    #[serde(rename = "sourcecountry", alias = "sourceCountry")]
    pub source_country: Option<String>,
}

/// A stored article. The URL is the unique identity; rows are immutable once
/// written, so re-ingesting a known URL is a skip, not an update. `seendate`
/// is the upstream's opaque timestamp string and is never reparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub seendate: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewsArticle {
    /// Normalizes a raw article into the stored shape. Returns `None` when
    /// the article has no URL: without one it has no unique identity and is
    /// not insertable.
    pub fn from_raw(raw: &RawArticle, now: DateTime<Utc>) -> Option<Self> {
        let url = raw.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(NewsArticle {
            url: url.to_string(),
            title: raw.title.clone(),
            domain: raw.domain.clone(),
            seendate: raw.seendate.clone(),
            created_at: now,
        })
    }
}

#[async_trait]
pub trait ArticleFeedProvider: Send + Sync {
    /// Fetches up to `max_records` candidate articles for the timespan.
    async fn fetch_articles(&self, max_records: usize, timespan: &str) -> Result<Vec<RawArticle>>;
}
