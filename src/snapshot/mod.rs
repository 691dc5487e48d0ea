//! Snapshot-to-parent correlation and cost reporting
//!
//! The pipeline runs in four stages:
//! 1. [`collect`] lists snapshots per (kind, account, region) partition
//! 2. [`resolver`] maps each snapshot to its parent instance or `Orphaned`
//! 3. [`normalize`] builds a [`CanonicalSnapshotRecord`], priced through [`pricing`]
//! 4. the exporters in `crate::output` write CSV and HTML

pub mod collect;
pub mod normalize;
pub mod pricing;
pub mod resolver;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::client::models::{ASSET_DB_SNAPSHOT, ASSET_EBS_SNAPSHOT};

pub use crate::client::lookup::Scope;

/// Kind of storage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Ebs,
    Db,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 2] = [SnapshotKind::Ebs, SnapshotKind::Db];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Ebs => "ebs",
            SnapshotKind::Db => "db",
        }
    }

    /// Inventory asset type of the snapshot itself
    pub fn asset_type(&self) -> &'static str {
        match self {
            SnapshotKind::Ebs => ASSET_EBS_SNAPSHOT,
            SnapshotKind::Db => ASSET_DB_SNAPSHOT,
        }
    }

    /// Parent type as written to the report
    pub fn parent_label(&self) -> &'static str {
        match self {
            SnapshotKind::Ebs => "ec2_instance",
            SnapshotKind::Db => "db_instance",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EBS snapshot storage tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTier {
    Standard,
    Archive,
    Other(String),
}

impl StorageTier {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => StorageTier::Standard,
            "archive" => StorageTier::Archive,
            _ => StorageTier::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StorageTier::Standard => "standard",
            StorageTier::Archive => "archive",
            StorageTier::Other(raw) => raw,
        }
    }
}

/// Sentinel written when a cost cannot be computed
pub const PRICES_NOT_PROVIDED: &str = "prices_not_provided";

/// A computed cost, or the reason there is none
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cost {
    Amount(f64),
    PricesNotProvided,
}

impl Cost {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Cost::Amount(value) => Some(*value),
            Cost::PricesNotProvided => None,
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Amount(value) => write!(f, "${:.4}", value),
            Cost::PricesNotProvided => f.write_str(PRICES_NOT_PROVIDED),
        }
    }
}

impl Serialize for Cost {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parent resource columns of a resolved snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentInfo {
    pub resource_type: String,
    pub resource_id: String,
    pub name: String,
    pub state: String,
}

/// One row of the snapshot report.
///
/// A record is orphaned exactly when it has no [`ParentInfo`], so the four
/// parent columns are either all filled or all empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSnapshotRecord {
    pub snapshot_id: String,
    pub snapshot_type: SnapshotKind,
    pub creation_date: Option<DateTime<Utc>>,
    pub age_days: u32,
    pub size_gb: Option<f64>,
    pub storage_tier: Option<StorageTier>,
    pub parent: Option<ParentInfo>,
    pub account_id: String,
    pub region: String,
    pub environment: String,
    pub monthly_cost: Cost,
    pub cost_since_creation: Cost,
}

impl CanonicalSnapshotRecord {
    pub fn orphaned(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent_resource_type(&self) -> &str {
        self.parent.as_ref().map_or("", |p| p.resource_type.as_str())
    }

    pub fn parent_resource_id(&self) -> &str {
        self.parent.as_ref().map_or("", |p| p.resource_id.as_str())
    }

    pub fn parent_name(&self) -> &str {
        self.parent.as_ref().map_or("", |p| p.name.as_str())
    }

    pub fn parent_state(&self) -> &str {
        self.parent.as_ref().map_or("", |p| p.state.as_str())
    }

    /// Creation date as RFC 3339, empty when unknown
    pub fn creation_date_text(&self) -> String {
        self.creation_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
    }

    /// Size as a decimal string, empty when unknown
    pub fn size_text(&self) -> String {
        self.size_gb.map(format_decimal).unwrap_or_default()
    }
}

/// Shortest decimal form of a size (`8`, `0.5`, `1.234567`)
pub fn format_decimal(value: f64) -> String {
    let text = format!("{:.6}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A snapshot that cannot become a report row
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("snapshot has no assetId, resourceId or id")]
    MissingSnapshotId,
}

/// Which records make it into the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFilter {
    #[default]
    All,
    OrphanedOnly,
    ParentOnly,
}

impl RecordFilter {
    pub fn from_flags(orphaned_only: bool, parent_only: bool) -> Self {
        match (orphaned_only, parent_only) {
            (true, _) => RecordFilter::OrphanedOnly,
            (_, true) => RecordFilter::ParentOnly,
            _ => RecordFilter::All,
        }
    }

    pub fn keep(&self, orphaned: bool) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::OrphanedOnly => orphaned,
            RecordFilter::ParentOnly => !orphaned,
        }
    }
}
