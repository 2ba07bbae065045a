// src/merge/mod.rs
//! Merge stage: read every source's artifact, reconcile columns, tag rows with
//! source identity and count them. Artifacts are never re-geocoded here.

pub mod columns;
pub mod presentation;

use anyhow::Result;
use indexmap::IndexMap;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::read_rows;
use crate::config::SourceConfig;
use crate::ingest::types::NormalizedEvent;

pub use columns::reconcile_row;
pub use presentation::{write_combined_csv, write_geojson, COMBINED_CSV, GEOJSON};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergedDataset {
    pub events: Vec<NormalizedEvent>,
    /// Kept rows per source name, in configured source order.
    pub counts: IndexMap<String, usize>,
}

impl MergedDataset {
    pub fn total(&self) -> usize {
        self.events.len()
    }
}

static DATE_SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{date\}").unwrap());

/// Turn an artifact name into a file-name matcher (`{date}` and `*` match anything).
fn name_matcher(pattern: &str) -> Option<Regex> {
    let pattern = DATE_SLOT.replace_all(pattern, "*");
    let parts: Vec<String> = pattern.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", parts.join(".*"))).ok()
}

fn newest_match(dir: &Path, matcher: &Regex) -> Option<PathBuf> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|n| matcher.is_match(n))
        .collect();
    names.sort();
    names.pop().map(|n| dir.join(n))
}

/// Find a source's artifact: the run folder first, then the working directory.
/// With a wildcard the lexicographically last match wins.
pub fn locate_artifact(pattern: &str, dir: &Path) -> Option<PathBuf> {
    let wild = pattern.contains('*') || pattern.contains("{date}");
    let cwd = PathBuf::from(".");
    let mut roots = vec![dir.to_path_buf()];
    if dir != cwd.as_path() {
        roots.push(cwd);
    }

    if !wild {
        return roots.into_iter().map(|r| r.join(pattern)).find(|p| p.is_file());
    }
    let matcher = name_matcher(pattern)?;
    roots.iter().find_map(|r| newest_match(r, &matcher))
}

fn load_source(source: &SourceConfig, path: &Path) -> Result<Vec<NormalizedEvent>> {
    let rows = read_rows(path)?;
    let total = rows.len();
    let kept: Vec<NormalizedEvent> = rows
        .iter()
        .filter_map(reconcile_row)
        .map(|(event, c)| NormalizedEvent {
            event,
            lat: c.lat,
            lon: c.lon,
            source: source.name.clone(),
            color: source.color.clone(),
            icon: source.icon.clone(),
        })
        .collect();
    if kept.len() < total {
        warn!(target: "merge", source = %source.name, dropped = total - kept.len(), "rows without title or coordinates dropped");
    }
    Ok(kept)
}

/// Merge all configured sources found in `dir`. Missing or unreadable
/// artifacts are logged and skipped.
pub fn merge_artifacts(sources: &[SourceConfig], dir: &Path) -> MergedDataset {
    crate::ingest::ensure_metrics_described();
    let mut out = MergedDataset::default();
    for source in sources {
        let Some(path) = locate_artifact(&source.artifact, dir) else {
            warn!(target: "merge", "✗ {}: file not found ({})", source.name, source.artifact);
            continue;
        };
        match load_source(source, &path) {
            Ok(events) => {
                info!(target: "merge", file = %path.display(), "✓ {}: {} events", source.name, events.len());
                counter!("merge_rows_total").increment(events.len() as u64);
                out.counts.insert(source.name.clone(), events.len());
                out.events.extend(events);
            }
            Err(e) => warn!(target: "merge", error = %e, "✗ {}: unreadable artifact", source.name),
        }
    }
    info!(target: "merge", total = out.total(), sources = out.counts.len(), "merge finished");
    out
}
