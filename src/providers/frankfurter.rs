use crate::core::error::{Error, Result};
use crate::core::rate::{Currency, DateWindow, RateSeries, RateSeriesProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default hard cap per feed call. Upstream is not worth a longer wait;
/// anything beyond this surfaces as an upstream error.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

// FrankfurterProvider implementation for RateSeriesProvider
pub struct FrankfurterProvider {
    base_url: String,
    quote: String,
    timeout: Duration,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, quote: &str) -> Self {
        FrankfurterProvider {
            base_url: base_url.to_string(),
            quote: quote.to_string(),
            timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize, Debug)]
struct TimeseriesResponse {
    #[serde(default)]
    rates: BTreeMap<String, HashMap<String, f64>>,
}

#[async_trait]
impl RateSeriesProvider for FrankfurterProvider {
    #[instrument(
        name = "FrankfurterSeriesFetch",
        skip(self, window),
        fields(base = %base)
    )]
    async fn fetch_series(&self, base: Currency, window: &DateWindow) -> Result<RateSeries> {
        let feed = format!("frankfurter/{base}");
        let url = format!("{}/v1/{}..{}", self.base_url, window.start, window.end);
        debug!("Requesting rate series from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("econsync/0.2")
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::upstream(feed.as_str(), e.to_string()))?;

        let response = client
            .get(&url)
            .query(&[("base", base.code()), ("symbols", self.quote.as_str())])
            .send()
            .await
            .map_err(|e| Error::upstream(feed.as_str(), format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::upstream(
                feed.as_str(),
                format!("status {}", response.status()),
            ));
        }

        let data = response
            .json::<TimeseriesResponse>()
            .await
            .map_err(|e| Error::upstream(feed.as_str(), format!("malformed body: {e}")))?;

        let mut points = BTreeMap::new();
        for (day_str, quotes) in data.rates {
            let day: NaiveDate = day_str
                .parse()
                .map_err(|_| Error::upstream(feed.as_str(), format!("bad date key: {day_str}")))?;
            // Upstream may quote more symbols than asked for; keep only ours.
            if let Some(rate) = quotes.get(&self.quote) {
                points.insert(day, *rate);
            }
        }

        debug!("Fetched {} points for {}", points.len(), base);
        Ok(RateSeries { base, points })
    }
}
