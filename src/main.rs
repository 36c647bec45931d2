//! CLI entry point for the trip-start explorer.
//!
//! Provides subcommands for listing the day sources, rendering the map and
//! chart documents for one selection, exporting a histogram as CSV, and an
//! interactive mode that reads selections from stdin.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_start_explorer::{
    DashboardView, DateKey, SourceCatalog, TripDataPipeline,
    fetch::BasicClient,
    output::{append_histogram, write_json},
    parser::DEFAULT_ROW_LIMIT,
    session::SelectionSession,
    stats::{HistogramShape, build_histogram, filter_by_hour_window},
};

#[derive(Parser)]
#[command(name = "trip_start_explorer")]
#[command(about = "Explore trip starts by day and hour", long_about = None)]
struct Cli {
    /// JSON file overriding the date-key sources (falls back to TRIP_SOURCE_CATALOG)
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Maximum rows read per source (falls back to TRIP_ROW_LIMIT, then 100000)
    #[arg(long, global = true)]
    row_limit: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the source bound to each date key
    Sources,
    /// Write map.json and chart.json for one date and hour
    View {
        /// Date key, 1 through 5
        #[arg(short, long)]
        date: DateKey,

        /// Hour of day, 0 through 23
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
        hour: u32,

        /// Load this file or URL instead of the catalog entry for the date
        #[arg(short, long, value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Directory the JSON documents are written to
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
    },
    /// Append per-minute counts for one date and hour to a CSV file
    Histogram {
        /// Date key, 1 through 5
        #[arg(short, long)]
        date: DateKey,

        /// Hour of day, 0 through 23
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
        hour: u32,

        /// CSV file to append rows to
        #[arg(short, long, default_value = "histogram.csv")]
        output: String,

        /// Number of buckets across the hour
        #[arg(short, long, default_value_t = 24)]
        buckets: usize,

        /// Upper edge of the last bucket, in minutes
        #[arg(short, long, default_value_t = 60)]
        range_max: u32,
    },
    /// Read `<date> <hour>` or `<hour>` lines from stdin and write documents per line
    Explore {
        /// Directory the JSON documents are written to
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/trip_start_explorer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_start_explorer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.catalog)?;
    let row_limit = match cli.row_limit {
        Some(n) => n,
        None => match std::env::var("TRIP_ROW_LIMIT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("TRIP_ROW_LIMIT is not a row count: '{raw}'"))?,
            Err(_) => DEFAULT_ROW_LIMIT,
        },
    };

    match cli.command {
        Commands::Sources => {
            for (key, location) in catalog.iter() {
                info!(date_key = %key, source = %location, "Source");
            }
        }
        Commands::View {
            date,
            hour,
            source,
            output_dir,
        } => {
            let mut catalog = catalog;
            if let Some(source) = source {
                catalog.set(date, source);
            }
            let pipeline = TripDataPipeline::new(BasicClient::new()?)
                .with_catalog(catalog)
                .with_row_limit(row_limit);

            let view = pipeline.view(date, hour).await?;
            write_view(&output_dir, &view)?;
        }
        Commands::Histogram {
            date,
            hour,
            output,
            buckets,
            range_max,
        } => {
            let shape = HistogramShape::new(buckets, range_max)?;
            let pipeline = TripDataPipeline::new(BasicClient::new()?)
                .with_catalog(catalog)
                .with_row_limit(row_limit);

            let loaded = pipeline.load_for(date).await?;
            let in_window = filter_by_hour_window(&loaded.records, hour)?;
            let histogram = build_histogram(&in_window, shape);
            append_histogram(&output, &histogram)?;

            let summary = histogram.summary();
            info!(
                output = %output,
                total = summary.total,
                peak_minute = summary.peak_minute,
                peak_count = summary.peak_count,
                "Histogram appended"
            );
        }
        Commands::Explore { output_dir } => {
            let pipeline = TripDataPipeline::new(BasicClient::new()?)
                .with_catalog(catalog)
                .with_row_limit(row_limit);
            explore(Arc::new(pipeline), &output_dir).await?;
        }
    }

    Ok(())
}

/// CLI flag first, then TRIP_SOURCE_CATALOG, then the built-in sources.
fn load_catalog(flag: Option<String>) -> Result<SourceCatalog> {
    let path = flag.or_else(|| std::env::var("TRIP_SOURCE_CATALOG").ok());
    match path {
        Some(path) => {
            info!(path = %path, "Loading source catalog");
            SourceCatalog::load(&path).with_context(|| format!("failed to load catalog '{path}'"))
        }
        None => Ok(SourceCatalog::builtin()),
    }
}

fn write_view(output_dir: &Path, view: &DashboardView) -> Result<()> {
    write_json(&output_dir.join("map.json"), &view.map)?;
    write_json(&output_dir.join("chart.json"), &view.chart)?;
    info!(
        date_key = %view.date_key,
        hour = view.hour,
        source = %view.source,
        map_points = view.map.points.len(),
        histogram_total = view.chart.summary.total,
        skipped_rows = view.skipped_rows,
        output_dir = %output_dir.display(),
        "Documents written"
    );
    Ok(())
}

/// Interactive loop. A line with two fields selects a date and an hour; a
/// line with one field changes only the hour. A new date aborts a load that
/// is still running for the previous one.
#[tracing::instrument(skip(pipeline), fields(output_dir = %output_dir.display()))]
async fn explore(pipeline: Arc<TripDataPipeline<BasicClient>>, output_dir: &Path) -> Result<()> {
    let mut session = SelectionSession::new(pipeline);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Enter '<date> <hour>' or '<hour>'; end input to quit");

    while let Some(line) = lines.next_line().await? {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let hour = match fields.as_slice() {
            [] => continue,
            [hour] => hour.parse::<u32>(),
            [date, hour] => match date.parse::<DateKey>() {
                Ok(key) => {
                    session.select(key);
                    hour.parse::<u32>()
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring selection");
                    continue;
                }
            },
            _ => {
                warn!(line = %line, "Expected '<date> <hour>' or '<hour>'");
                continue;
            }
        };

        let hour = match hour {
            Ok(hour) => hour,
            Err(e) => {
                warn!(error = %e, "Hour must be a number from 0 to 23");
                continue;
            }
        };

        match session.view(hour).await {
            Ok(view) => write_view(output_dir, &view)?,
            Err(e) => warn!(error = %e, "Selection failed"),
        }
    }

    Ok(())
}
