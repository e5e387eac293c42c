//! Point-in-time exports of the store.
//!
//! An export call writes into a fresh `<root>/YYYY-MM-DD/HHMMSS/` directory.
//! Rows for the structured and tabular modes are materialized in one read
//! before any file is written, so the output reflects a single coherent view
//! of the store. The modes are independent: one failing is reported but does
//! not stop the others.

use crate::core::article::NewsArticle;
use crate::core::error::{Error, Result};
use crate::core::rate::ExchangeRate;
use crate::store::{ArticleStore, RateStore};
use crate::ui;
use chrono::{DateTime, Local};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    All,
    Raw,
    Json,
    Csv,
}

impl FromStr for BackupFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(BackupFormat::All),
            "raw" => Ok(BackupFormat::Raw),
            "json" => Ok(BackupFormat::Json),
            "csv" => Ok(BackupFormat::Csv),
            _ => Err(Error::validation(
                "format",
                format!("format must be all, raw, json or csv, got {s}"),
            )),
        }
    }
}

impl BackupFormat {
    fn modes(&self) -> Vec<BackupMode> {
        match self {
            BackupFormat::All => vec![BackupMode::Raw, BackupMode::Json, BackupMode::Csv],
            BackupFormat::Raw => vec![BackupMode::Raw],
            BackupFormat::Json => vec![BackupMode::Json],
            BackupFormat::Csv => vec![BackupMode::Csv],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    Raw,
    Json,
    Csv,
}

impl Display for BackupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackupMode::Raw => "raw",
            BackupMode::Json => "json",
            BackupMode::Csv => "csv",
        };
        write!(f, "{name}")
    }
}

/// Per-mode result; failure of one mode never silently skips another.
pub struct ModeOutcome {
    pub mode: BackupMode,
    pub result: Result<Vec<PathBuf>>,
}

pub struct BackupReport {
    pub dir: PathBuf,
    pub outcomes: Vec<ModeOutcome>,
}

impl BackupReport {
    pub fn files(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.result.is_err())
    }

    pub fn display(&self) -> String {
        let mut output = format!("Backup directory: {}\n", self.dir.display());
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(files) => {
                    output.push_str(&format!("  {}: {} file(s)\n", outcome.mode, files.len()));
                    for file in files {
                        output.push_str(&format!("    {}\n", file.display()));
                    }
                }
                Err(e) => {
                    output.push_str(&format!(
                        "  {}: {}\n",
                        outcome.mode,
                        ui::style_text(&format!("failed: {e}"), ui::StyleType::Error)
                    ));
                }
            }
        }
        output
    }
}

/// Rows captured in one coherent read, shared by the json and csv modes.
struct Snapshot {
    rates: Vec<ExchangeRate>,
    articles: Vec<NewsArticle>,
}

/// Runs the requested export modes under a timestamped directory.
/// `raw_source` is the store's backing directory; `None` (store not
/// file-based) fails only the raw mode.
pub async fn run(
    rates: &dyn RateStore,
    articles: &dyn ArticleStore,
    raw_source: Option<&Path>,
    format: BackupFormat,
    export_root: &Path,
    now: DateTime<Local>,
) -> Result<BackupReport> {
    let dir = export_root
        .join(now.format("%Y-%m-%d").to_string())
        .join(now.format("%H%M%S").to_string());
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::store(format!("cannot create {}: {e}", dir.display())))?;
    info!("Exporting store to {}", dir.display());

    let modes = format.modes();

    // One coherent read up front; file writes below never touch the store.
    let snapshot = if modes.iter().any(|m| *m != BackupMode::Raw) {
        Some(Snapshot {
            rates: rates.all_rates().await?,
            articles: articles.all_articles().await?,
        })
    } else {
        None
    };

    let mut outcomes = Vec::new();
    for mode in modes {
        let result = match (mode, snapshot.as_ref()) {
            (BackupMode::Raw, _) => dump_raw(raw_source, &dir),
            (BackupMode::Json, Some(snapshot)) => dump_json(snapshot, &dir),
            (BackupMode::Csv, Some(snapshot)) => dump_csv(snapshot, &dir),
            (_, None) => Err(Error::store("export rows were not captured")),
        };
        if let Err(e) = &result {
            debug!("Backup mode {mode} failed: {e}");
        }
        outcomes.push(ModeOutcome { mode, result });
    }

    Ok(BackupReport { dir, outcomes })
}

fn dump_raw(source: Option<&Path>, dir: &Path) -> Result<Vec<PathBuf>> {
    let source = source.ok_or_else(|| Error::store("store has no backing directory to copy"))?;
    if !source.exists() {
        return Err(Error::store(format!(
            "store directory not found: {}",
            source.display()
        )));
    }
    let dst = dir.join("store");
    copy_dir_recursive(source, &dst)
        .map_err(|e| Error::store(format!("raw copy failed: {e}")))?;
    Ok(vec![dst])
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn dump_json(snapshot: &Snapshot, dir: &Path) -> Result<Vec<PathBuf>> {
    let exchange_path = dir.join("exchange.json");
    let news_path = dir.join("news.json");

    write_json(&exchange_path, &snapshot.rates)?;
    write_json(&news_path, &snapshot.articles)?;

    Ok(vec![exchange_path, news_path])
}

fn write_json<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::store(format!("cannot create {}: {e}", path.display())))?;
    serde_json::to_writer_pretty(file, rows)
        .map_err(|e| Error::store(format!("cannot write {}: {e}", path.display())))?;
    Ok(())
}

fn dump_csv(snapshot: &Snapshot, dir: &Path) -> Result<Vec<PathBuf>> {
    let exchange_path = dir.join("exchange.csv");
    let news_path = dir.join("news.csv");

    let mut writer = csv_writer(&exchange_path)?;
    write_record(
        &mut writer,
        &exchange_path,
        &["day", "currency", "rate", "created_at", "updated_at"],
    )?;
    for row in &snapshot.rates {
        write_record(
            &mut writer,
            &exchange_path,
            &[
                &row.day.to_string(),
                row.currency.code(),
                &row.rate.to_string(),
                &row.created_at.to_rfc3339(),
                &row.updated_at.to_rfc3339(),
            ],
        )?;
    }
    flush_csv(writer, &exchange_path)?;

    let mut writer = csv_writer(&news_path)?;
    write_record(
        &mut writer,
        &news_path,
        &["url", "title", "domain", "seendate", "created_at"],
    )?;
    for row in &snapshot.articles {
        write_record(
            &mut writer,
            &news_path,
            &[
                &row.url,
                row.title.as_deref().unwrap_or(""),
                row.domain.as_deref().unwrap_or(""),
                row.seendate.as_deref().unwrap_or(""),
                &row.created_at.to_rfc3339(),
            ],
        )?;
    }
    flush_csv(writer, &news_path)?;

    Ok(vec![exchange_path, news_path])
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path)
        .map_err(|e| Error::store(format!("cannot create {}: {e}", path.display())))
}

fn write_record(
    writer: &mut csv::Writer<std::fs::File>,
    path: &Path,
    record: &[&str],
) -> Result<()> {
    writer
        .write_record(record)
        .map_err(|e| Error::store(format!("cannot write {}: {e}", path.display())))
}

fn flush_csv(mut writer: csv::Writer<std::fs::File>, path: &Path) -> Result<()> {
    writer
        .flush()
        .map_err(|e| Error::store(format!("cannot flush {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::Currency;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, Utc};
    use tempfile::tempdir;

    /// Delegates to a shared store, but sneaks one more rate in right after
    /// the export captures its rows. A row landing mid-export must stay out
    /// of the written files entirely.
    struct InsertAfterCapture<'a> {
        inner: &'a MemoryStore,
        late_row: ExchangeRate,
    }

    #[async_trait]
    impl RateStore for InsertAfterCapture<'_> {
        async fn get_rate(
            &self,
            day: NaiveDate,
            currency: Currency,
        ) -> Result<Option<ExchangeRate>> {
            self.inner.get_rate(day, currency).await
        }

        async fn rates_in_range(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<ExchangeRate>> {
            self.inner.rates_in_range(start, end).await
        }

        async fn upsert_rates(&self, rows: &[ExchangeRate]) -> Result<()> {
            self.inner.upsert_rates(rows).await
        }

        async fn all_rates(&self) -> Result<Vec<ExchangeRate>> {
            let rows = self.inner.all_rates().await?;
            self.inner.upsert_rates(&[self.late_row.clone()]).await?;
            Ok(rows)
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .upsert_rates(&[
                ExchangeRate {
                    day: "2025-03-10".parse().unwrap(),
                    currency: Currency::Usd,
                    rate: 1351.0,
                    created_at: now,
                    updated_at: now,
                },
                ExchangeRate {
                    day: "2025-03-09".parse().unwrap(),
                    currency: Currency::Eur,
                    rate: 1460.0,
                    created_at: now,
                    updated_at: now,
                },
            ])
            .await
            .unwrap();

        store
            .insert_article(&NewsArticle {
                url: "https://cnbc.com/old".to_string(),
                title: Some("Old, with \"quotes\"".to_string()),
                domain: Some("cnbc.com".to_string()),
                seendate: None,
                created_at: now - Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .insert_article(&NewsArticle {
                url: "https://mk.co.kr/new".to_string(),
                title: None,
                domain: Some("mk.co.kr".to_string()),
                seendate: Some("20250310T120000Z".to_string()),
                created_at: now,
            })
            .await
            .unwrap();

        store
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("ALL".parse::<BackupFormat>().unwrap(), BackupFormat::All);
        assert_eq!("csv".parse::<BackupFormat>().unwrap(), BackupFormat::Csv);
        assert!("sqlite".parse::<BackupFormat>().is_err());
    }

    #[tokio::test]
    async fn test_json_export_preserves_attributes_and_order() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();

        let report = run(
            &store,
            &store,
            None,
            BackupFormat::Json,
            root.path(),
            Local::now(),
        )
        .await
        .unwrap();

        assert!(!report.has_failures());
        let content = std::fs::read_to_string(report.dir.join("exchange.json")).unwrap();
        let rows: Vec<ExchangeRate> = serde_json::from_str(&content).unwrap();
        // Oldest day first.
        assert_eq!(rows[0].day.to_string(), "2025-03-09");
        assert_eq!(rows[1].currency, Currency::Usd);

        let content = std::fs::read_to_string(report.dir.join("news.json")).unwrap();
        let articles: Vec<NewsArticle> = serde_json::from_str(&content).unwrap();
        // Newest article first.
        assert_eq!(articles[0].url, "https://mk.co.kr/new");
        assert_eq!(articles[1].title.as_deref(), Some("Old, with \"quotes\""));
    }

    #[tokio::test]
    async fn test_csv_export_headers_and_rows() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();

        let report = run(
            &store,
            &store,
            None,
            BackupFormat::Csv,
            root.path(),
            Local::now(),
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(report.dir.join("exchange.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "day,currency,rate,created_at,updated_at"
        );
        assert_eq!(lines.count(), 2);

        let content = std::fs::read_to_string(report.dir.join("news.csv")).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "url,title,domain,seendate,created_at");
        assert!(content.contains("https://mk.co.kr/new"));
    }

    #[tokio::test]
    async fn test_row_inserted_mid_export_never_appears_partially() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();
        let now = Utc::now();

        let racing = InsertAfterCapture {
            inner: &store,
            late_row: ExchangeRate {
                day: "2025-03-11".parse().unwrap(),
                currency: Currency::Jpy,
                rate: 9.1,
                created_at: now,
                updated_at: now,
            },
        };

        let report = run(
            &racing,
            &store,
            None,
            BackupFormat::Csv,
            root.path(),
            Local::now(),
        )
        .await
        .unwrap();
        assert!(!report.has_failures());

        // The late row landed in the store...
        assert_eq!(store.all_rates().await.unwrap().len(), 3);

        // ...but the export holds the pre-insert view, every line intact.
        let content = std::fs::read_to_string(report.dir.join("exchange.csv")).unwrap();
        assert!(!content.contains("2025-03-11"));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            assert_eq!(line.split(',').count(), 5, "partial row: {line}");
        }
    }

    #[tokio::test]
    async fn test_all_reports_per_mode_and_raw_failure_is_isolated() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();

        // No backing directory: raw must fail, json and csv must still run.
        let report = run(
            &store,
            &store,
            None,
            BackupFormat::All,
            root.path(),
            Local::now(),
        )
        .await
        .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.has_failures());

        let raw = report
            .outcomes
            .iter()
            .find(|o| o.mode == BackupMode::Raw)
            .unwrap();
        assert!(raw.result.is_err());

        for mode in [BackupMode::Json, BackupMode::Csv] {
            let outcome = report.outcomes.iter().find(|o| o.mode == mode).unwrap();
            assert!(outcome.result.is_ok(), "{mode} should have succeeded");
        }
        assert_eq!(report.files().len(), 4);
    }

    #[tokio::test]
    async fn test_raw_mode_copies_backing_directory() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();

        let source = tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("partitions")).unwrap();
        std::fs::write(source.path().join("journal"), b"abc").unwrap();
        std::fs::write(source.path().join("partitions/rates"), b"xyz").unwrap();

        let report = run(
            &store,
            &store,
            Some(source.path()),
            BackupFormat::Raw,
            root.path(),
            Local::now(),
        )
        .await
        .unwrap();

        assert!(!report.has_failures());
        let copied = report.dir.join("store");
        assert_eq!(std::fs::read(copied.join("journal")).unwrap(), b"abc");
        assert_eq!(
            std::fs::read(copied.join("partitions/rates")).unwrap(),
            b"xyz"
        );
    }

    #[tokio::test]
    async fn test_export_dir_grouped_by_day_then_time() {
        let store = seeded_store().await;
        let root = tempdir().unwrap();

        let now = Local::now();
        let report = run(&store, &store, None, BackupFormat::Json, root.path(), now)
            .await
            .unwrap();

        let expected = root
            .path()
            .join(now.format("%Y-%m-%d").to_string())
            .join(now.format("%H%M%S").to_string());
        assert_eq!(report.dir, expected);
    }
}
