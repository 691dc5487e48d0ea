//! Snapshot report command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use colored::Colorize;
use log::debug;
use tokio::sync::mpsc;

use crate::cli::{CommandContext, GlobalOptions, SnapshotsArgs};
use crate::error::{Error, Result};
use crate::output::csv::CsvExporter;
use crate::output::{html, progress, table};
use crate::snapshot::collect::{CollectOptions, collect};
use crate::snapshot::pricing::PriceTable;
use crate::snapshot::{RecordFilter, SnapshotKind, format_decimal};

/// Records buffered between the collectors and the report writers
const RECORD_BUFFER: usize = 1024;

/// `reports/snapshot-report-YYYYMMDD-HHMMSS.csv` for the current time
pub fn default_report_path() -> PathBuf {
    PathBuf::from("reports").join(format!(
        "snapshot-report-{}.csv",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}

/// CSV and HTML paths for a report target
fn report_paths(out: &Path, args: &SnapshotsArgs) -> (Option<PathBuf>, Option<PathBuf>) {
    let csv = args.format.csv().then(|| out.to_path_buf());
    let html = args.format.html().then(|| html::html_path_for(out));
    (csv, html)
}

pub async fn run(opts: &GlobalOptions, args: &SnapshotsArgs) -> Result<()> {
    let prices = if args.no_costs {
        None
    } else {
        Some(Arc::new(PriceTable::load(args.pricing_file.as_deref())?))
    };

    let out = args.out.clone().unwrap_or_else(default_report_path);
    let (csv_path, html_path) = report_paths(&out, args);

    // Open the CSV before any API work so a bad path fails fast
    let mut exporter = match &csv_path {
        Some(path) => Some(CsvExporter::create(path, prices.is_some())?),
        None => None,
    };

    let ctx = CommandContext::new(opts).await?;
    let options = CollectOptions {
        kinds: SnapshotKind::ALL.to_vec(),
        accounts: args.account_ids.clone(),
        regions: args.regions.clone(),
        since_days: args.since_days,
        filter: RecordFilter::from_flags(args.orphaned_only, args.parent_only),
        batch: !args.individual,
        concurrency: args.concurrency.unwrap_or(ctx.config.concurrency),
    };
    debug!("Collecting with {:?}", options);

    let spinner = progress::spinner("Collecting snapshots");
    let (sink, records) = mpsc::channel(RECORD_BUFFER);
    let mut report = html::SummaryBuilder::new();
    let writing = async {
        let mut records = records;
        while let Some(record) = records.recv().await {
            if let Some(exporter) = exporter.as_mut() {
                exporter.write_record(&record)?;
            }
            report.add(&record);
        }
        Ok::<(), Error>(())
    };
    let (summary, written) = tokio::join!(
        collect(Arc::clone(&ctx.client), options, prices, sink),
        writing
    );
    spinner.finish_and_clear();
    summary.log();
    written?;

    if let (Some(exporter), Some(path)) = (exporter, &csv_path) {
        let rows = exporter.finish()?;
        println!("{} CSV report: {} ({} rows)", "✓".green(), path.display(), rows);
    }
    let costs = report.finish();
    if let Some(path) = &html_path {
        html::write_report(path, &costs)?;
        println!("{} HTML report: {}", "✓".green(), path.display());
    }

    let mut rows = vec![
        ("Snapshots listed", summary.listed.to_string()),
        ("Records written", summary.records().to_string()),
        ("Orphaned", summary.orphaned.to_string()),
        ("With parent", summary.parented.to_string()),
        ("Skipped", summary.skipped.to_string()),
        (
            "Failed partitions",
            format!("{} of {}", summary.failed.len(), summary.partitions),
        ),
    ];
    if !args.no_costs {
        rows.push((
            "Monthly cost",
            format!("${}", format_decimal(costs.total_monthly_cost)),
        ));
        rows.push((
            "Orphaned monthly cost",
            format!("${}", format_decimal(costs.orphaned_monthly_cost)),
        ));
    }
    rows.push((
        "Elapsed",
        format!("{:.1}s", summary.elapsed.as_secs_f64()),
    ));
    println!("{}", table::format_summary(&rows));

    for (label, error) in &summary.failed {
        eprintln!("{} {} failed: {}", "⚠".yellow(), label, error);
    }
    Ok(())
}
