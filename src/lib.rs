pub mod backup;
pub mod core;
pub mod news;
pub mod providers;
pub mod rates;
pub mod store;
pub mod ui;

use crate::backup::BackupFormat;
use crate::core::config::AppConfig;
use crate::core::rate::SortOrder;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::providers::gdelt::GdeltProvider;
use crate::store::disk::DiskStore;
use anyhow::Result;
use chrono::Local;
use tracing::{debug, info};

/// Logical operations exposed to the CLI and to integration tests.
pub enum AppCommand {
    RefreshRates { days: i64 },
    Rates { days: i64, order: SortOrder },
    RefreshNews { max_records: usize, timespan: String },
    News { limit: usize },
    Backup { format: BackupFormat },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Econ sync starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let store = DiskStore::open(&data_path.join("store"))?;

    match command {
        AppCommand::RefreshRates { days } => {
            let quote = config.quote_currency()?;
            let base_url = config
                .providers
                .frankfurter
                .as_ref()
                .map_or("https://api.frankfurter.dev", |p| &p.base_url);
            let provider = FrankfurterProvider::new(base_url, &quote);

            let pb = ui::new_spinner("Fetching exchange rates...");
            let outcome = rates::refresh(&provider, &store, days, Local::now().date_naive()).await;
            pb.finish_and_clear();
            let outcome = outcome?;

            println!(
                "Saved {} rate(s) for {}",
                outcome.saved, outcome.window
            );
        }
        AppCommand::Rates { days, order } => {
            let view = rates::read(&store, days, order, Local::now().date_naive()).await?;
            println!("{}", view.display_as_table());
            println!(
                "{}",
                ui::style_text(
                    "Weekends and holidays may have no upstream data.",
                    ui::StyleType::Subtle
                )
            );
        }
        AppCommand::RefreshNews {
            max_records,
            timespan,
        } => {
            let base_url = config
                .providers
                .gdelt
                .as_ref()
                .map_or("https://api.gdeltproject.org", |p| &p.base_url);
            let provider = GdeltProvider::new(base_url);
            let filter = news::NewsFilter::from_config(&config.news_filter);

            let pb = ui::new_spinner("Fetching news articles...");
            let outcome = news::refresh(&provider, &store, &filter, max_records, &timespan).await;
            pb.finish_and_clear();
            let outcome = outcome?;

            println!(
                "Fetched {} raw, {} passed filters, {} newly saved ({})",
                outcome.fetched, outcome.filtered, outcome.saved_new, outcome.timespan
            );
        }
        AppCommand::News { limit } => {
            let view = news::read(&store, limit).await?;
            println!("{}", view.display_as_table());
        }
        AppCommand::Backup { format } => {
            // Flush so the raw copy sees the current on-disk state.
            store.persist()?;
            let report = backup::run(
                &store,
                &store,
                Some(store.path()),
                format,
                &data_path.join("backups"),
                Local::now(),
            )
            .await?;
            print!("{}", report.display());
            if report.has_failures() {
                anyhow::bail!("backup finished with failed modes");
            }
        }
    }

    Ok(())
}
