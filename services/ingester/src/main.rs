//! wx-ingest: GRIB ingestion worker and tools.
//!
//! Drains the ingest queue, imports local GRIB files, reduces remote files
//! to the configured fields, and prints daily summaries for a location.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use ingester::commands::{self, Catalog, SummaryRequest};
use ingester::{logging, IngesterConfig};

#[derive(Parser, Debug)]
#[command(name = "wx-ingest")]
#[command(about = "Weather model ingestion and summaries")]
struct Args {
    /// Catalog seed files or directories (YAML)
    #[arg(long, global = true, env = "CATALOG_SEED", value_delimiter = ',')]
    seed: Vec<PathBuf>,

    /// Log level or filter directives (default: RUST_LOG, then info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process the ingest queue until it is empty
    Worker,

    /// Ingest local GRIB files; each needs a `.idx` next to it
    Import {
        /// Source short name, e.g. hrrr
        source: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Download only the source's configured fields of a remote GRIB file
    Reduce {
        grib_url: String,
        idx_url: String,
        source: String,
        out: PathBuf,
    },

    /// Print daily summaries for a location as JSON
    Summarize {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value_t = 3)]
        days: u32,
        /// Unix seconds (default: now)
        #[arg(long)]
        start: Option<i64>,
        /// Hours east of UTC for day boundaries
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        utc_offset: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level.as_deref(), args.log_json)?;

    let config = IngesterConfig::from_env()?;
    info!(
        database = config.database_url.is_some(),
        local_store = ?config.storage.local_path,
        "Loaded configuration"
    );
    let catalog = Catalog::open(&config, &args.seed).await?;

    match args.command {
        Command::Worker => {
            let stats = commands::run_worker(&config, catalog).await?;
            info!(?stats, "Worker finished");
        }
        Command::Import { source, files } => {
            let ingestor = commands::ingestor(&config, &catalog, commands::field_store(&config)?);
            for (file, stats) in files
                .iter()
                .zip(commands::import_files(&ingestor, &source, &files).await?)
            {
                info!(file = %file.display(), ?stats, "Imported");
            }
        }
        Command::Reduce {
            grib_url,
            idx_url,
            source,
            out,
        } => {
            let stats =
                commands::reduce_to_file(&config, &catalog, &grib_url, &idx_url, &source, &out)
                    .await?;
            info!(out = %out.display(), ?stats, "Reduced");
        }
        Command::Summarize {
            lat,
            lon,
            days,
            start,
            utc_offset,
        } => {
            let start = match start {
                Some(ts) => Utc
                    .timestamp_opt(ts, 0)
                    .single()
                    .with_context(|| format!("Invalid start timestamp: {}", ts))?,
                None => Utc::now(),
            };
            let request = SummaryRequest {
                lat,
                lon,
                start,
                days,
                utc_offset_hours: utc_offset,
            };
            let store = commands::field_store(&config)?;
            let response = commands::summarize(&catalog, store.as_ref(), &request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
