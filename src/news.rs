//! News refresh and read paths: server-side filtering plus a deduplicating
//! upsert keyed by URL.

use crate::core::article::{ArticleFeedProvider, NewsArticle, RawArticle};
use crate::core::config::NewsFilterConfig;
use crate::core::error::{Error, Result};
use crate::store::ArticleStore;
use crate::ui;
use chrono::Utc;
use comfy_table::Cell;
use std::collections::HashSet;
use tracing::{debug, info};

/// Publishers whose articles are accepted. US/global business press plus the
/// major Korean outlets.
pub const TRUSTED_DOMAINS: [&str; 6] = [
    "cnbc.com",
    "yna.co.kr",
    "mk.co.kr",
    "hankyung.com",
    "sedaily.com",
    "biz.chosun.com",
];

pub const ALLOWED_SOURCE_COUNTRIES: [&str; 4] = ["US", "USA", "KR", "KOR"];

/// Title fallback when the source-country field is absent or unclassifiable.
const COUNTRY_TITLE_KEYWORDS: [&str; 4] = ["korea", "south korea", "u.s.", "united states"];

/// How many candidates to pull per refresh, well beyond the caller's target
/// count to absorb filtering losses.
const OVERFETCH_COUNT: usize = 250;

/// Immutable filter configuration, injected at construction so tests can
/// substitute their own sets.
pub struct NewsFilter {
    trusted_domains: HashSet<String>,
    allowed_countries: HashSet<String>,
}

impl NewsFilter {
    pub fn new<D, C>(trusted_domains: D, allowed_countries: C) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        NewsFilter {
            trusted_domains: trusted_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .collect(),
            allowed_countries: allowed_countries
                .into_iter()
                .map(|c| c.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    pub fn from_config(config: &NewsFilterConfig) -> Self {
        match (&config.trusted_domains, &config.allowed_countries) {
            (Some(domains), Some(countries)) => NewsFilter::new(domains, countries),
            (Some(domains), None) => NewsFilter::new(domains, &ALLOWED_SOURCE_COUNTRIES),
            (None, Some(countries)) => NewsFilter::new(&TRUSTED_DOMAINS, countries),
            (None, None) => NewsFilter::default(),
        }
    }

    pub fn is_trusted_domain(&self, article: &RawArticle) -> bool {
        article
            .domain
            .as_deref()
            .map(|d| self.trusted_domains.contains(&d.trim().to_lowercase()))
            .unwrap_or(false)
    }

    /// Origin check: the explicit source-country code when present, falling
    /// back to country-name literals in the title. The fallback is a
    /// deliberately approximate heuristic, not an authoritative classifier.
    pub fn is_allowed_country(&self, article: &RawArticle) -> bool {
        if let Some(code) = article.source_country.as_deref() {
            if self.allowed_countries.contains(&code.trim().to_uppercase()) {
                return true;
            }
        }
        let title = article.title.as_deref().unwrap_or("").to_lowercase();
        COUNTRY_TITLE_KEYWORDS.iter().any(|kw| title.contains(kw))
    }

    /// Selects up to `target` articles passing both predicates, preserving
    /// upstream order and stopping the scan as soon as the target is met.
    /// Fewer than `target` passing is a normal outcome, not an error.
    pub fn select<'a>(&self, raw: &'a [RawArticle], target: usize) -> Vec<&'a RawArticle> {
        let mut picked = Vec::new();
        for article in raw {
            if picked.len() >= target {
                break;
            }
            if self.is_trusted_domain(article) && self.is_allowed_country(article) {
                picked.push(article);
            }
        }
        picked
    }
}

impl Default for NewsFilter {
    fn default() -> Self {
        NewsFilter::new(&TRUSTED_DOMAINS, &ALLOWED_SOURCE_COUNTRIES)
    }
}

#[derive(Debug)]
pub struct NewsRefreshOutcome {
    pub timespan: String,
    pub fetched: usize,
    pub filtered: usize,
    pub saved_new: usize,
}

/// Over-fetches candidates, filters them, and inserts the survivors that are
/// not already stored. Each article's skip/insert is independently
/// idempotent, so a partially-completed refresh is safe to re-run.
pub async fn refresh(
    provider: &dyn ArticleFeedProvider,
    store: &dyn ArticleStore,
    filter: &NewsFilter,
    max_records: usize,
    timespan: &str,
) -> Result<NewsRefreshOutcome> {
    if !(1..=100).contains(&max_records) {
        return Err(Error::validation(
            "max_records",
            format!("max_records must be between 1 and 100, got {max_records}"),
        ));
    }

    let raw = provider.fetch_articles(OVERFETCH_COUNT, timespan).await?;
    let picked = filter.select(&raw, max_records);
    debug!("{} of {} raw articles passed filtering", picked.len(), raw.len());

    let now = Utc::now();
    let mut saved_new = 0;
    for candidate in &picked {
        // URL-less articles have no identity and never reach the store.
        let Some(article) = NewsArticle::from_raw(candidate, now) else {
            continue;
        };
        if store.insert_article(&article).await? {
            saved_new += 1;
        }
    }

    info!(
        "News refresh: fetched {}, filtered {}, saved {} new",
        raw.len(),
        picked.len(),
        saved_new
    );

    Ok(NewsRefreshOutcome {
        timespan: timespan.to_string(),
        fetched: raw.len(),
        filtered: picked.len(),
        saved_new,
    })
}

#[derive(Debug)]
pub struct NewsView {
    pub articles: Vec<NewsArticle>,
}

impl NewsView {
    pub fn count(&self) -> usize {
        self.articles.len()
    }

    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Title"),
            ui::header_cell("Domain"),
            ui::header_cell("Seen"),
            ui::header_cell("Stored"),
        ]);

        for article in &self.articles {
            table.add_row(vec![
                Cell::new(article.title.as_deref().unwrap_or(&article.url)),
                Cell::new(article.domain.as_deref().unwrap_or("N/A")),
                Cell::new(article.seendate.as_deref().unwrap_or("N/A")),
                Cell::new(article.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }

        let mut output = format!(
            "{} article(s)\n\n",
            ui::style_text(&self.count().to_string(), ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output
    }
}

/// Newest-first read of stored articles.
pub async fn read(store: &dyn ArticleStore, limit: usize) -> Result<NewsView> {
    if !(1..=200).contains(&limit) {
        return Err(Error::validation(
            "limit",
            format!("limit must be between 1 and 200, got {limit}"),
        ));
    }
    let articles = store.recent_articles(limit).await?;
    Ok(NewsView { articles })
}
