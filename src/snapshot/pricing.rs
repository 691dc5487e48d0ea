//! Snapshot storage prices per region
//!
//! Prices are USD per GB-month. A default table ships with the binary;
//! `--pricing-file` replaces it with a file of the same shape.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tabled::Tabled;

use super::{Cost, SnapshotKind, StorageTier};
use crate::error::{ConfigError, Result};

const BUNDLED_PRICES: &str = include_str!("../../data/snapshot-prices.json");

/// Average days per month used to prorate costs
pub const DAYS_PER_MONTH: f64 = 30.44;

/// Unit prices for one region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionPrices {
    #[serde(default)]
    pub ebs_snapshot_gb_month: Option<f64>,
    #[serde(default)]
    pub ebs_archive_snapshot_gb_month: Option<f64>,
    #[serde(default)]
    pub rds_snapshot_gb_month: Option<f64>,
}

/// Price table file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionPrices>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl PriceTable {
    /// The table shipped with the binary
    pub fn bundled() -> Result<Self> {
        let table = serde_json::from_str(BUNDLED_PRICES)
            .map_err(|e| ConfigError::Invalid(format!("bundled price table: {}", e)))?;
        Ok(table)
    }

    /// Load from `path`, or the bundled table when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::bundled();
        };
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::NotFound(format!("{} ({})", path.display(), e))
        })?;
        let table: PriceTable = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        log::info!(
            "Loaded prices for {} regions from {}",
            table.regions.len(),
            path.display()
        );
        Ok(table)
    }

    /// Price per GB-month for a snapshot kind and tier in `region`.
    ///
    /// EBS snapshots without a tier are priced as standard; tiers other
    /// than standard and archive have no price.
    pub fn unit_price(
        &self,
        region: &str,
        kind: SnapshotKind,
        tier: Option<&StorageTier>,
    ) -> Option<f64> {
        let prices = self.regions.get(region)?;
        match (kind, tier) {
            (SnapshotKind::Db, _) => prices.rds_snapshot_gb_month,
            (SnapshotKind::Ebs, None | Some(StorageTier::Standard)) => prices.ebs_snapshot_gb_month,
            (SnapshotKind::Ebs, Some(StorageTier::Archive)) => prices.ebs_archive_snapshot_gb_month,
            (SnapshotKind::Ebs, Some(StorageTier::Other(_))) => None,
        }
    }

    /// Monthly storage cost of a snapshot
    pub fn monthly_cost(
        &self,
        size_gb: Option<f64>,
        region: &str,
        kind: SnapshotKind,
        tier: Option<&StorageTier>,
    ) -> Cost {
        if region.is_empty() {
            return Cost::PricesNotProvided;
        }
        match (size_gb, self.unit_price(region, kind, tier)) {
            (Some(size), Some(price)) => Cost::Amount(size * price),
            _ => Cost::PricesNotProvided,
        }
    }

    /// Rows for display, sorted by region
    pub fn rows(&self) -> Vec<PriceRow> {
        self.regions
            .iter()
            .map(|(region, prices)| PriceRow {
                region: region.clone(),
                ebs: format_price(prices.ebs_snapshot_gb_month),
                ebs_archive: format_price(prices.ebs_archive_snapshot_gb_month),
                rds: format_price(prices.rds_snapshot_gb_month),
            })
            .collect()
    }
}

/// Cost accrued since creation, prorated by 30.44-day months
pub fn cost_since_creation(monthly: Cost, age_days: u32) -> Cost {
    match monthly {
        Cost::Amount(value) => Cost::Amount(value * f64::from(age_days) / DAYS_PER_MONTH),
        Cost::PricesNotProvided => Cost::PricesNotProvided,
    }
}

fn format_price(price: Option<f64>) -> String {
    price
        .map(|p| format!("${:.4}", p))
        .unwrap_or_else(|| "N/A".to_string())
}

/// One region of the price table
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct PriceRow {
    #[tabled(rename = "REGION")]
    pub region: String,
    #[tabled(rename = "EBS SNAPSHOT")]
    pub ebs: String,
    #[tabled(rename = "EBS ARCHIVE")]
    pub ebs_archive: String,
    #[tabled(rename = "RDS SNAPSHOT")]
    pub rds: String,
}
