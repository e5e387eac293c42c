use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use econsync::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch the recent exchange-rate window and upsert it into the store
    RefreshRates {
        /// Window size in days (2-60)
        #[arg(long, default_value_t = 14)]
        days: i64,
    },
    /// Display stored exchange rates, one row per day
    Rates {
        /// Window size in days (2-60)
        #[arg(long, default_value_t = 14)]
        days: i64,
        /// Sort direction: asc or desc
        #[arg(long, default_value = "asc")]
        order: String,
    },
    /// Fetch, filter and store recent economy news
    RefreshNews {
        /// Target number of articles to keep (1-100)
        #[arg(long, default_value_t = 20)]
        max_records: usize,
        /// Upstream timespan, e.g. 1d or 12h
        #[arg(long, default_value = "1d")]
        timespan: String,
    },
    /// Display stored articles, newest first
    News {
        /// Maximum number of articles (1-200)
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Export the store: all, raw, json or csv
    Backup {
        #[arg(long, default_value = "all")]
        format: String,
    },
}

fn to_app_command(cmd: Commands) -> Result<econsync::AppCommand> {
    let command = match cmd {
        Commands::RefreshRates { days } => econsync::AppCommand::RefreshRates { days },
        Commands::Rates { days, order } => econsync::AppCommand::Rates {
            days,
            order: order.parse()?,
        },
        Commands::RefreshNews {
            max_records,
            timespan,
        } => econsync::AppCommand::RefreshNews {
            max_records,
            timespan,
        },
        Commands::News { limit } => econsync::AppCommand::News { limit },
        Commands::Backup { format } => econsync::AppCommand::Backup {
            format: format.parse()?,
        },
        Commands::Setup => unreachable!("Setup command should be handled separately"),
    };
    Ok(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => econsync::run_command(to_app_command(cmd)?, cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> Result<()> {
    use anyhow::Context;

    let path = econsync::core::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Include the example config as a string literal in the binary
    let default_config = include_str!("../docs/example_config.yaml");

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
