//! HTML summary of a snapshot report

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::Result;
use crate::snapshot::CanonicalSnapshotRecord;

/// Upper bounds (inclusive, in days) of the age buckets; the last bucket is open
const AGE_BUCKETS: [(&str, Option<u32>); 5] = [
    ("0-30 days", Some(30)),
    ("31-90 days", Some(90)),
    ("91-180 days", Some(180)),
    ("181-365 days", Some(365)),
    ("1+ years", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    pub snapshot_type: String,
    pub count: usize,
    pub orphaned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCost {
    pub region: String,
    pub count: usize,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountCount {
    pub account_id: String,
    pub orphaned: usize,
    pub parented: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub label: String,
    pub count: usize,
}

/// Aggregates rendered into the HTML page
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub generated_at: String,
    pub total: usize,
    pub orphaned: usize,
    pub parented: usize,
    /// Sum of priced monthly costs; unpriced records are left out
    pub total_monthly_cost: f64,
    pub orphaned_monthly_cost: f64,
    /// Records without a computable cost
    pub unpriced: usize,
    pub by_type: Vec<TypeCount>,
    /// Sorted by cost, highest first
    pub by_region: Vec<RegionCost>,
    pub by_account: Vec<AccountCount>,
    pub age_buckets: Vec<AgeBucket>,
}

/// Running aggregates for [`ReportSummary`], fed one record at a time as
/// the report streams
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    total: usize,
    orphaned: usize,
    parented: usize,
    total_monthly_cost: f64,
    orphaned_monthly_cost: f64,
    unpriced: usize,
    types: BTreeMap<String, TypeCount>,
    regions: BTreeMap<String, RegionCost>,
    accounts: BTreeMap<String, AccountCount>,
    ages: [usize; AGE_BUCKETS.len()],
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &CanonicalSnapshotRecord) {
        self.total += 1;
        let orphaned = record.orphaned();
        if orphaned {
            self.orphaned += 1;
        } else {
            self.parented += 1;
        }

        let cost = record.monthly_cost.amount();
        match cost {
            Some(amount) => {
                self.total_monthly_cost += amount;
                if orphaned {
                    self.orphaned_monthly_cost += amount;
                }
            }
            None => self.unpriced += 1,
        }

        let kind = record.snapshot_type.to_string();
        let entry = self.types.entry(kind.clone()).or_insert(TypeCount {
            snapshot_type: kind,
            count: 0,
            orphaned: 0,
        });
        entry.count += 1;
        entry.orphaned += usize::from(orphaned);

        let region = display_key(&record.region);
        let entry = self.regions.entry(region.clone()).or_insert(RegionCost {
            region,
            count: 0,
            monthly_cost: 0.0,
        });
        entry.count += 1;
        entry.monthly_cost += cost.unwrap_or(0.0);

        let account = display_key(&record.account_id);
        let entry = self.accounts.entry(account.clone()).or_insert(AccountCount {
            account_id: account,
            orphaned: 0,
            parented: 0,
        });
        if orphaned {
            entry.orphaned += 1;
        } else {
            entry.parented += 1;
        }

        self.ages[age_bucket(record.age_days)] += 1;
    }

    pub fn finish(self) -> ReportSummary {
        let mut by_region: Vec<RegionCost> = self.regions.into_values().collect();
        by_region.sort_by(|a, b| b.monthly_cost.total_cmp(&a.monthly_cost));

        ReportSummary {
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            total: self.total,
            orphaned: self.orphaned,
            parented: self.parented,
            total_monthly_cost: self.total_monthly_cost,
            orphaned_monthly_cost: self.orphaned_monthly_cost,
            unpriced: self.unpriced,
            by_type: self.types.into_values().collect(),
            by_region,
            by_account: self.accounts.into_values().collect(),
            age_buckets: AGE_BUCKETS
                .iter()
                .zip(self.ages)
                .map(|((label, _), count)| AgeBucket {
                    label: label.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

fn display_key(value: &str) -> String {
    if value.is_empty() {
        "(unknown)".to_string()
    } else {
        value.to_string()
    }
}

/// Index into the age buckets for `age_days`
pub fn age_bucket(age_days: u32) -> usize {
    AGE_BUCKETS
        .iter()
        .position(|(_, max)| max.is_none_or(|max| age_days <= max))
        .unwrap_or(AGE_BUCKETS.len() - 1)
}

/// HTML path for a CSV report: same directory and stem, `.html` extension
pub fn html_path_for(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("html")
}

pub fn render(summary: &ReportSummary) -> Result<String> {
    let context = Context::from_serialize(summary)?;
    Ok(Tera::one_off(REPORT_TEMPLATE, &context, true)?)
}

/// Render and write the summary page to `path`
pub fn write_report(path: &Path, summary: &ReportSummary) -> Result<()> {
    let html = render(summary)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)?;
    log::info!("HTML report written to {}", path.display());
    Ok(())
}

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Snapshot report</title>
<style>
  body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem; color: #222; }
  h1 { margin-bottom: 0.2rem; }
  .muted { color: #777; }
  .cards { display: flex; gap: 1rem; margin: 1.5rem 0; flex-wrap: wrap; }
  .card { border: 1px solid #ddd; border-radius: 8px; padding: 1rem 1.5rem; min-width: 10rem; }
  .card .value { font-size: 1.6rem; font-weight: 600; }
  .orphaned { color: #b3261e; }
  table { border-collapse: collapse; margin: 0.5rem 0 2rem; }
  th, td { border-bottom: 1px solid #eee; padding: 0.4rem 1rem; text-align: left; }
  th { background: #f6f6f6; }
  td.num { text-align: right; font-variant-numeric: tabular-nums; }
</style>
</head>
<body>
<h1>Snapshot report</h1>
<p class="muted">Generated {{ generated_at }}</p>

<div class="cards">
  <div class="card"><div class="muted">Snapshots</div><div class="value">{{ total }}</div></div>
  <div class="card"><div class="muted">Orphaned</div><div class="value orphaned">{{ orphaned }}</div></div>
  <div class="card"><div class="muted">With parent</div><div class="value">{{ parented }}</div></div>
  <div class="card"><div class="muted">Monthly cost</div><div class="value">${{ total_monthly_cost | round(precision=2) }}</div></div>
  <div class="card"><div class="muted">Orphaned monthly cost</div><div class="value orphaned">${{ orphaned_monthly_cost | round(precision=2) }}</div></div>
</div>
{% if unpriced > 0 %}<p class="muted">{{ unpriced }} snapshots have no price and are not included in the cost totals.</p>{% endif %}

<h2>By type</h2>
<table>
  <tr><th>Type</th><th>Snapshots</th><th>Orphaned</th></tr>
  {% for row in by_type %}<tr><td>{{ row.snapshot_type }}</td><td class="num">{{ row.count }}</td><td class="num">{{ row.orphaned }}</td></tr>
  {% endfor %}
</table>

<h2>Cost by region</h2>
<table>
  <tr><th>Region</th><th>Snapshots</th><th>Monthly cost</th></tr>
  {% for row in by_region %}<tr><td>{{ row.region }}</td><td class="num">{{ row.count }}</td><td class="num">${{ row.monthly_cost | round(precision=2) }}</td></tr>
  {% endfor %}
</table>

<h2>By account</h2>
<table>
  <tr><th>Account</th><th>Orphaned</th><th>With parent</th></tr>
  {% for row in by_account %}<tr><td>{{ row.account_id }}</td><td class="num">{{ row.orphaned }}</td><td class="num">{{ row.parented }}</td></tr>
  {% endfor %}
</table>

<h2>Age</h2>
<table>
  <tr><th>Age</th><th>Snapshots</th></tr>
  {% for bucket in age_buckets %}<tr><td>{{ bucket.label }}</td><td class="num">{{ bucket.count }}</td></tr>
  {% endfor %}
</table>
</body>
</html>
"#;
