use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::filter::RecordFilter;
use crate::paginate::{PageSource, Paginator};
use crate::record::{QuoteRow, RawRecord, Row, TileRow};
use crate::reveal::{Collector, RenderingSession};
use crate::sink::Dataset;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub raw: usize,
    pub rows: usize,
    pub dropped: usize,
    pub duplicates: usize,
    /// Highest page that yielded records (pagination runs).
    pub pages: u32,
    /// Reveal operations performed (reveal runs).
    pub reveals: u32,
    pub no_content_found: bool,
    pub output: Option<PathBuf>,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>, raw: usize) -> Self {
        RunReport {
            started_at,
            raw,
            rows: 0,
            dropped: 0,
            duplicates: 0,
            pages: 0,
            reveals: 0,
            no_content_found: false,
            output: None,
        }
    }
}

/// Normalize, filter and dedup raw records into one dataset.
pub fn assemble<R: Row>(raw: &[RawRecord]) -> (Dataset<R>, RecordFilter) {
    let mut filter = RecordFilter::new();
    let mut dataset = Dataset::new().dedup();
    for record in raw {
        let row = R::from_raw(record);
        if filter.admit(&row) {
            dataset.push(row);
        }
    }
    (dataset, filter)
}

fn finish<R: Row>(report: &mut RunReport, raw: &[RawRecord], out: &Path) -> Result<()> {
    let (dataset, filter) = assemble::<R>(raw);
    report.rows = dataset
        .write(out)
        .with_context(|| format!("writing {}", out.display()))?;
    report.dropped = filter.dropped();
    report.duplicates = dataset.duplicates();
    report.output = Some(out.to_path_buf());
    debug!(
        admitted = filter.admitted(),
        dropped = report.dropped,
        duplicates = report.duplicates,
        "dataset assembled"
    );
    Ok(())
}

/// Page through a quotes source and write the dataset. A failed page aborts
/// the run before anything is written.
pub async fn quotes_to_csv<S: PageSource + ?Sized>(
    paginator: &Paginator,
    source: &S,
    out: &Path,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let raw = paginator.run(source).await.map_err(|e| {
        warn!(collected = e.collected, page = e.page, error = %e.source, "pagination failed");
        anyhow::Error::new(e).context("no output written")
    })?;

    let mut report = RunReport::new(started_at, raw.len());
    report.pages = raw.iter().filter_map(|r| r.page).max().unwrap_or(0);
    finish::<QuoteRow>(&mut report, &raw, out)?;
    info!(rows = report.rows, pages = report.pages, "quotes run complete");
    Ok(report)
}

/// Reveal tiles in `session` and write the dataset. Nothing is written when
/// no tile ever appeared.
pub async fn tiles_to_csv<S: RenderingSession>(
    collector: &Collector,
    session: S,
    url: &str,
    out: &Path,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let outcome = collector.run(session, url).await.map_err(|e| {
        warn!(collected = e.collected, reveals = e.reveals, error = %e.source, "tile collection failed");
        anyhow::Error::new(e).context(format!("collecting tiles from {url}; no output written"))
    })?;

    let mut report = RunReport::new(started_at, outcome.records.len());
    report.reveals = outcome.state.reveals;
    if outcome.no_content_found {
        report.no_content_found = true;
        return Ok(report);
    }

    finish::<TileRow>(&mut report, &outcome.records, out)?;
    info!(rows = report.rows, reveals = report.reveals, "tiles run complete");
    Ok(report)
}
