use crate::core::article::{ArticleFeedProvider, RawArticle};
use crate::core::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const FEED: &str = "gdelt";

/// Default hard cap; news queries run a little slower than the rates feed.
const FETCH_TIMEOUT: Duration = Duration::from_secs(25);

/// Fixed topic query, kept short deliberately (long OR-chains get rejected).
const QUERY: &str = r#"(economy OR inflation OR "interest rate" OR "central bank" OR GDP)"#;

// GdeltProvider implementation for ArticleFeedProvider
pub struct GdeltProvider {
    base_url: String,
    timeout: Duration,
}

impl GdeltProvider {
    pub fn new(base_url: &str) -> Self {
        GdeltProvider {
            base_url: base_url.to_string(),
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize, Debug)]
struct ArtListResponse {
    // GDELT omits the key entirely when the query has no hits
    #[serde(default)]
    articles: Vec<RawArticle>,
}

fn truncate(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

#[async_trait]
impl ArticleFeedProvider for GdeltProvider {
    #[instrument(name = "GdeltArticleFetch", skip(self))]
    async fn fetch_articles(&self, max_records: usize, timespan: &str) -> Result<Vec<RawArticle>> {
        let url = format!("{}/api/v2/doc/doc", self.base_url);
        debug!("Requesting articles from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("econsync/0.2")
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::upstream(FEED, e.to_string()))?;

        let max_records = max_records.to_string();
        let response = client
            .get(&url)
            .query(&[
                ("query", QUERY),
                ("mode", "ArtList"),
                ("format", "json"),
                ("maxrecords", max_records.as_str()),
                ("sort", "HybridRel"),
                ("timespan", timespan),
            ])
            .send()
            .await
            .map_err(|e| Error::upstream(FEED, format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(FEED, format!("unreadable body: {e}")))?;

        if !status.is_success() {
            return Err(Error::upstream(
                FEED,
                format!("status {status}, body: {}", truncate(&body, 500)),
            ));
        }

        // GDELT answers some bad requests with HTML and a 200 status
        let data: ArtListResponse = serde_json::from_str(&body)
            .map_err(|_| Error::upstream(FEED, format!("non-JSON body: {}", truncate(&body, 500))))?;

        debug!("Fetched {} raw articles", data.articles.len());
        Ok(data.articles)
    }
}
