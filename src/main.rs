//! city-event-map: command line entrypoint.
//!
//! `fetch` runs one source, `merge` combines the artifacts of a folder,
//! `run` does all sources into a fresh timestamped folder and merges them.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use city_event_map::config::AppConfig;
use city_event_map::ingest::{run_configured_source, PipelineReport};
use city_event_map::merge::{merge_artifacts, write_combined_csv, write_geojson, COMBINED_CSV, GEOJSON};

#[derive(Debug, Parser)]
#[command(name = "city-event-map", version, about = "Collect city events from several sites onto one map")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and geocode one source (by id or name).
    Fetch {
        source: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Day to fetch, YYYY-MM-DD (default: today).
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Merge the artifacts found in a folder.
    Merge {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// All sources into output/<timestamp>, then merge.
    Run {
        #[arg(long, default_value = "output")]
        out_root: PathBuf,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date `{s}`, expected YYYY-MM-DD (e.g. 2025-12-19)"))
}

/// Compact logs by default; `EVENTS_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("city_event_map=info,warn"));
    let json = std::env::var("EVENTS_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn log_report(r: &PipelineReport) {
    match &r.artifact {
        Some(p) => info!(
            source = %r.source,
            found = r.found,
            with_coordinates = r.with_coordinates,
            dropped = r.dropped,
            "✓ {} written", p.display()
        ),
        None => info!(source = %r.source, "no events, nothing written"),
    }
}

fn merge_folder(app: &AppConfig, dir: &Path) -> Result<()> {
    let ds = merge_artifacts(&app.sources, dir);
    if ds.events.is_empty() {
        bail!("no events with coordinates in {}", dir.display());
    }
    let csv_path = dir.join(COMBINED_CSV);
    let geo_path = dir.join(GEOJSON);
    write_combined_csv(&ds, &csv_path)?;
    write_geojson(&ds, &app.sources, &geo_path)?;
    for (name, count) in &ds.counts {
        info!("  {name}: {count}");
    }
    info!(total = ds.total(), csv = %csv_path.display(), geojson = %geo_path.display(), "✓ merged");
    Ok(())
}

async fn run_all(app: &AppConfig, out_root: &Path, day: NaiveDate) -> Result<()> {
    let folder = out_root.join(Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());
    std::fs::create_dir_all(&folder)
        .with_context(|| format!("creating run folder {}", folder.display()))?;
    info!(folder = %folder.display(), "run folder");

    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for source in &app.sources {
        let t0 = std::time::Instant::now();
        match run_configured_source(app, source, day, &folder).await {
            Ok(report) => {
                log_report(&report);
                info!(source = %source.name, secs = t0.elapsed().as_secs_f64(), "source done");
                if report.artifact.is_some() {
                    ok.push(source.name.clone());
                }
            }
            Err(e) => {
                error!(source = %source.name, error = %format!("{e:#}"), "✗ source failed");
                failed.push(source.name.clone());
            }
        }
    }
    info!(successful = ok.len(), failed = failed.len(), "scraping summary");
    if !failed.is_empty() {
        warn!(sources = ?failed, "some sources failed");
    }
    if ok.is_empty() {
        bail!("no source produced an artifact; nothing to merge");
    }
    merge_folder(app, &folder)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let app = AppConfig::load_default()?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Fetch { source, out, date } => {
            let Some(cfg) = app.source(&source) else {
                let known: Vec<&str> = app.sources.iter().map(|s| s.id.as_str()).collect();
                bail!("unknown source `{source}` (configured: {})", known.join(", "));
            };
            let report = run_configured_source(&app, cfg, date.unwrap_or(today), &out).await?;
            log_report(&report);
        }
        Command::Merge { dir } => merge_folder(&app, &dir)?,
        Command::Run { out_root, date } => run_all(&app, &out_root, date.unwrap_or(today)).await?,
    }
    Ok(())
}
