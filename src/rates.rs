//! Exchange-rate refresh and read paths.
//!
//! A refresh is a pure function of (current store contents, freshly fetched
//! series): the three feeds are fetched up front, merged against existing
//! rows, and committed as one atomic batch. Reads recompose stored rows into
//! one record per calendar day.

use crate::core::error::Result;
use crate::core::rate::{
    Currency, DateWindow, ExchangeRate, RateSeriesProvider, SortOrder,
};
use crate::store::RateStore;
use crate::ui;
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::Cell;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug)]
pub struct RefreshOutcome {
    pub window: DateWindow,
    /// Number of (day, currency) pairs upserted, overwrites included.
    pub saved: usize,
}

/// One merged read row: every tracked currency for a single day, absent
/// observations as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyQuote {
    pub date: NaiveDate,
    pub usd: Option<f64>,
    pub eur: Option<f64>,
    pub jpy: Option<f64>,
}

impl DailyQuote {
    fn empty(date: NaiveDate) -> Self {
        DailyQuote {
            date,
            usd: None,
            eur: None,
            jpy: None,
        }
    }

    fn set(&mut self, currency: Currency, rate: f64) {
        match currency {
            Currency::Usd => self.usd = Some(rate),
            Currency::Eur => self.eur = Some(rate),
            Currency::Jpy => self.jpy = Some(rate),
        }
    }

    /// 100-unit JPY figure, derived on read and never stored.
    pub fn jpy100(&self) -> Option<f64> {
        self.jpy.map(|j| j * 100.0)
    }
}

#[derive(Debug)]
pub struct RatesView {
    pub window: DateWindow,
    pub rows: Vec<DailyQuote>,
}

impl RatesView {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell("USD"),
            ui::header_cell("EUR"),
            ui::header_cell("JPY"),
            ui::header_cell("JPY x100"),
        ]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(row.date.to_string()),
                ui::format_optional_cell(row.usd, |v| format!("{v:.2}")),
                ui::format_optional_cell(row.eur, |v| format!("{v:.2}")),
                ui::format_optional_cell(row.jpy, |v| format!("{v:.4}")),
                ui::format_optional_cell(row.jpy100(), |v| format!("{v:.2}")),
            ]);
        }

        let mut output = format!(
            "Exchange rates {}\n\n",
            ui::style_text(&self.window.to_string(), ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output
    }
}

/// Merge rule for one (day, currency) pair: an existing row keeps its
/// creation timestamp and takes the new rate and `updated_at`; a fresh pair
/// gets `now` for both. Replaying the same payload converges to the same
/// stored state.
fn plan_row(
    existing: Option<ExchangeRate>,
    day: NaiveDate,
    currency: Currency,
    rate: f64,
    now: DateTime<Utc>,
) -> ExchangeRate {
    match existing {
        Some(mut row) => {
            row.rate = rate;
            row.updated_at = now;
            row
        }
        None => ExchangeRate {
            day,
            currency,
            rate,
            created_at: now,
            updated_at: now,
        },
    }
}

/// Fetches all three currency series for the window and upserts the union
/// into the store. Any single feed failing aborts the whole refresh before
/// anything is written; fetched data from the other feeds is discarded.
pub async fn refresh(
    provider: &dyn RateSeriesProvider,
    store: &dyn RateStore,
    days: i64,
    today: NaiveDate,
) -> Result<RefreshOutcome> {
    let window = DateWindow::last_days(days, today)?;
    info!("Refreshing exchange rates over {window}");

    let (usd, eur, jpy) = futures::try_join!(
        provider.fetch_series(Currency::Usd, &window),
        provider.fetch_series(Currency::Eur, &window),
        provider.fetch_series(Currency::Jpy, &window),
    )?;

    let now = Utc::now();
    let mut rows = Vec::new();
    for series in [&usd, &eur, &jpy] {
        for (&day, &rate) in &series.points {
            // Values outside the requested window are never stored.
            if !window.contains(day) {
                debug!("Dropping out-of-window point {day} for {}", series.base);
                continue;
            }
            let existing = store.get_rate(day, series.base).await?;
            rows.push(plan_row(existing, day, series.base, rate, now));
        }
    }

    store.upsert_rates(&rows).await?;
    info!("Upserted {} rate rows", rows.len());

    Ok(RefreshOutcome {
        window,
        saved: rows.len(),
    })
}

/// Reads stored rows for the window and regroups them by day, one field per
/// currency. Sort direction only flips the presentation; it never changes
/// which rows are included.
pub async fn read(
    store: &dyn RateStore,
    days: i64,
    order: SortOrder,
    today: NaiveDate,
) -> Result<RatesView> {
    let window = DateWindow::last_days(days, today)?;
    let stored = store.rates_in_range(window.start, window.end).await?;

    // Ordered map keyed by day, so iteration order is deterministic.
    let mut by_day: BTreeMap<NaiveDate, DailyQuote> = BTreeMap::new();
    for row in stored {
        by_day
            .entry(row.day)
            .or_insert_with(|| DailyQuote::empty(row.day))
            .set(row.currency, row.rate);
    }

    let mut rows: Vec<DailyQuote> = by_day.into_values().collect();
    if order == SortOrder::Desc {
        rows.reverse();
    }

    Ok(RatesView { window, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::rate::RateSeries;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};

    struct StubProvider {
        series: HashMap<Currency, BTreeMap<NaiveDate, f64>>,
        fail: Option<Currency>,
    }

    impl StubProvider {
        fn new() -> Self {
            StubProvider {
                series: HashMap::new(),
                fail: None,
            }
        }

        fn with(mut self, base: Currency, points: &[(&str, f64)]) -> Self {
            let map = points
                .iter()
                .map(|(d, v)| (d.parse().unwrap(), *v))
                .collect();
            self.series.insert(base, map);
            self
        }
    }

    #[async_trait]
    impl RateSeriesProvider for StubProvider {
        async fn fetch_series(&self, base: Currency, _window: &DateWindow) -> Result<RateSeries> {
            if self.fail == Some(base) {
                return Err(Error::upstream(
                    format!("frankfurter/{base}"),
                    "status 502".to_string(),
                ));
            }
            Ok(RateSeries {
                base,
                points: self.series.get(&base).cloned().unwrap_or_default(),
            })
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_union_of_dates() {
        // USD covers {d1, d2}, EUR covers {d2, d3}, JPY covers {}.
        let provider = StubProvider::new()
            .with(
                Currency::Usd,
                &[("2025-03-08", 1350.0), ("2025-03-09", 1351.0)],
            )
            .with(Currency::Eur, &[("2025-03-09", 1460.0), ("2025-03-10", 1461.0)])
            .with(Currency::Jpy, &[]);
        let store = MemoryStore::new();

        let outcome = refresh(&provider, &store, 5, day("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(outcome.saved, 4);

        let view = read(&store, 5, SortOrder::Asc, day("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(view.rows.len(), 3);

        assert_eq!(view.rows[0].date, day("2025-03-08"));
        assert_eq!(view.rows[0].usd, Some(1350.0));
        assert_eq!(view.rows[0].eur, None);
        assert_eq!(view.rows[0].jpy, None);

        assert_eq!(view.rows[1].usd, Some(1351.0));
        assert_eq!(view.rows[1].eur, Some(1460.0));

        assert_eq!(view.rows[2].usd, None);
        assert_eq!(view.rows[2].eur, Some(1461.0));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let provider = StubProvider::new().with(Currency::Usd, &[("2025-03-09", 1350.0)]);
        let store = MemoryStore::new();
        let today = day("2025-03-10");

        refresh(&provider, &store, 5, today).await.unwrap();
        let first = store
            .get_rate(day("2025-03-09"), Currency::Usd)
            .await
            .unwrap()
            .unwrap();

        refresh(&provider, &store, 5, today).await.unwrap();
        let rows = store.all_rates().await.unwrap();
        assert_eq!(rows.len(), 1);

        let second = &rows[0];
        assert_eq!(second.rate, 1350.0);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_replay_overwrites_rate_in_place() {
        let store = MemoryStore::new();
        let today = day("2025-03-10");

        let provider = StubProvider::new().with(Currency::Usd, &[("2025-03-09", 1350.0)]);
        refresh(&provider, &store, 5, today).await.unwrap();

        let provider = StubProvider::new().with(Currency::Usd, &[("2025-03-09", 1360.0)]);
        refresh(&provider, &store, 5, today).await.unwrap();

        let rows = store.all_rates().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rate, 1360.0);
    }

    #[tokio::test]
    async fn test_one_feed_failure_aborts_whole_refresh() {
        let mut provider = StubProvider::new()
            .with(Currency::Usd, &[("2025-03-09", 1350.0)])
            .with(Currency::Jpy, &[("2025-03-09", 9.1)]);
        provider.fail = Some(Currency::Eur);
        let store = MemoryStore::new();

        let err = refresh(&provider, &store, 5, day("2025-03-10"))
            .await
            .unwrap_err();
        match err {
            Error::Upstream { feed, .. } => assert_eq!(feed, "frankfurter/EUR"),
            other => panic!("expected upstream error, got {other:?}"),
        }

        // Nothing from the feeds that did answer was committed.
        assert!(store.all_rates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_window_points_are_dropped() {
        let provider = StubProvider::new().with(
            Currency::Usd,
            &[("2025-02-01", 1300.0), ("2025-03-09", 1350.0)],
        );
        let store = MemoryStore::new();

        let outcome = refresh(&provider, &store, 5, day("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(outcome.saved, 1);
        assert_eq!(store.all_rates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_jpy100_derived_on_read() {
        let provider = StubProvider::new().with(Currency::Jpy, &[("2025-03-09", 0.0091)]);
        let store = MemoryStore::new();
        refresh(&provider, &store, 5, day("2025-03-10")).await.unwrap();

        let view = read(&store, 5, SortOrder::Asc, day("2025-03-10"))
            .await
            .unwrap();
        let derived = view.rows[0].jpy100().unwrap();
        assert!((derived - 0.91).abs() < 1e-9);

        // Only the per-unit value is stored.
        let stored = store
            .get_rate(day("2025-03-09"), Currency::Jpy)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.rate, 0.0091);
    }

    #[tokio::test]
    async fn test_sort_order_is_presentation_only() {
        let provider = StubProvider::new().with(
            Currency::Usd,
            &[("2025-03-08", 1.0), ("2025-03-09", 2.0), ("2025-03-10", 3.0)],
        );
        let store = MemoryStore::new();
        refresh(&provider, &store, 5, day("2025-03-10")).await.unwrap();

        let asc = read(&store, 5, SortOrder::Asc, day("2025-03-10"))
            .await
            .unwrap();
        let desc = read(&store, 5, SortOrder::Desc, day("2025-03-10"))
            .await
            .unwrap();

        assert_eq!(asc.rows.len(), desc.rows.len());
        assert_eq!(asc.rows.first(), desc.rows.last());
        assert_eq!(asc.rows.last(), desc.rows.first());
    }

    #[tokio::test]
    async fn test_read_validates_window() {
        let store = MemoryStore::new();
        assert!(
            read(&store, 1, SortOrder::Asc, day("2025-03-10"))
                .await
                .is_err()
        );
        assert!(
            read(&store, 61, SortOrder::Asc, day("2025-03-10"))
                .await
                .is_err()
        );
        assert!(
            read(&store, 2, SortOrder::Asc, day("2025-03-10"))
                .await
                .is_ok()
        );
        assert!(
            read(&store, 60, SortOrder::Asc, day("2025-03-10"))
                .await
                .is_ok()
        );
    }
}
