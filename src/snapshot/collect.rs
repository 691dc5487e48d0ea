//! Snapshot collection across (kind, account, region) partitions
//!
//! Every partition is an independent task: it lists the snapshots, resolves
//! their parents, normalizes and filters them. Partitions run through the
//! bounded fan-out and send each record to the sink as soon as it is built,
//! so a run never holds the whole report in memory. A failed partition is
//! reported in the summary while the others complete.
//!
//! The inventory cannot filter by region, so region partitions of one
//! account share one snapshot listing per kind and one instance listing.
//! Whichever partition asks first fetches it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, mpsc};

use super::normalize::{normalize, region};
use super::pricing::PriceTable;
use super::resolver::{ParentResolver, Resolution};
use super::{CanonicalSnapshotRecord, RecordFilter, Scope, SnapshotKind};
use crate::client::api::InventoryApi;
use crate::client::lookup::AssetLookup;
use crate::client::models::RawAsset;
use crate::client::pagination::{InventoryPager, InventoryQuery};
use crate::client::parallel::fan_out;
use crate::error::{Error, Result};

/// Where partitions deliver records, in completion order
pub type RecordSink = mpsc::Sender<CanonicalSnapshotRecord>;

/// What to collect and how
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub kinds: Vec<SnapshotKind>,
    /// Accounts to scan; empty scans every account in one partition
    pub accounts: Vec<String>,
    /// Regions to keep; empty keeps every region in one partition
    pub regions: Vec<String>,
    /// Only snapshots created within this many days
    pub since_days: Option<u32>,
    pub filter: RecordFilter,
    /// Resolve EBS parents with one batched lookup per partition
    pub batch: bool,
    pub concurrency: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            kinds: SnapshotKind::ALL.to_vec(),
            accounts: Vec::new(),
            regions: Vec::new(),
            since_days: None,
            filter: RecordFilter::All,
            batch: true,
            concurrency: 8,
        }
    }
}

/// One unit of collection work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Position in the partition list
    pub index: usize,
    pub kind: SnapshotKind,
    pub scope: Scope,
}

impl Partition {
    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.scope.label())
    }
}

/// Cross product of kinds, accounts and regions
pub fn partitions(options: &CollectOptions) -> Vec<Partition> {
    let accounts: Vec<Option<String>> = if options.accounts.is_empty() {
        vec![None]
    } else {
        options.accounts.iter().cloned().map(Some).collect()
    };
    let regions: Vec<Option<String>> = if options.regions.is_empty() {
        vec![None]
    } else {
        options.regions.iter().cloned().map(Some).collect()
    };

    let mut out = Vec::new();
    for kind in &options.kinds {
        for account in &accounts {
            for region in &regions {
                out.push(Partition {
                    index: out.len(),
                    kind: *kind,
                    scope: Scope::new(account.clone(), region.clone()),
                });
            }
        }
    }
    out
}

/// Inventory query listing the snapshots of one partition
pub fn snapshot_query(
    kind: SnapshotKind,
    scope: &Scope,
    since_days: Option<u32>,
    page_size: usize,
) -> InventoryQuery {
    let query = scope.query(page_size).asset_type(kind.asset_type());
    match since_days {
        Some(days) => query.created_within_days(days),
        None => query,
    }
}

/// Listings a partition shares with the other regions of its account
#[derive(Debug, Clone, Default)]
pub struct SharedListings {
    /// Snapshots of the partition's kind, every region
    pub snapshots: Arc<OnceCell<Vec<RawAsset>>>,
    /// EC2 instances, every region
    pub instances: Arc<OnceCell<Vec<RawAsset>>>,
}

/// Shared listings for each partition, aligned by index.
///
/// Snapshot listings are keyed by (kind, account), instance listings by
/// account alone.
pub fn shared_listings(parts: &[Partition]) -> Vec<SharedListings> {
    let mut snapshots: HashMap<(SnapshotKind, Option<String>), Arc<OnceCell<Vec<RawAsset>>>> =
        HashMap::new();
    let mut instances: HashMap<Option<String>, Arc<OnceCell<Vec<RawAsset>>>> = HashMap::new();

    parts
        .iter()
        .map(|p| {
            let account = p.scope.account_id.clone();
            SharedListings {
                snapshots: Arc::clone(snapshots.entry((p.kind, account.clone())).or_default()),
                instances: Arc::clone(instances.entry(account).or_default()),
            }
        })
        .collect()
}

/// Lookup that serves one shared instance listing and delegates the rest
struct SharedInstanceLookup<'a, C: ?Sized> {
    client: &'a C,
    instances: &'a OnceCell<Vec<RawAsset>>,
}

#[async_trait]
impl<'a, C: InventoryApi + ?Sized> AssetLookup for SharedInstanceLookup<'a, C> {
    async fn get_volume(&self, volume_id: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        AssetLookup::get_volume(self.client, volume_id, scope).await
    }

    async fn get_volumes_batch(
        &self,
        volume_ids: &[String],
        scope: &Scope,
    ) -> Result<HashMap<String, RawAsset>> {
        AssetLookup::get_volumes_batch(self.client, volume_ids, scope).await
    }

    async fn list_instances(&self, scope: &Scope) -> Result<Vec<RawAsset>> {
        let listing = self
            .instances
            .get_or_try_init(|| AssetLookup::list_instances(self.client, scope))
            .await?;
        Ok(listing.clone())
    }

    async fn get_instance(&self, instance_id: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        AssetLookup::get_instance(self.client, instance_id, scope).await
    }

    async fn get_db_instance(&self, identifier: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        AssetLookup::get_db_instance(self.client, identifier, scope).await
    }
}

/// Counts from one partition; its records went to the sink
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Snapshots listed before filtering
    pub listed: usize,
    /// Snapshots dropped because they could not become a record
    pub skipped: usize,
    pub orphaned: usize,
    pub parented: usize,
}

/// Collect one partition, sending each kept record to `sink`.
///
/// Fails if the listing fails or the sink has been closed.
pub async fn collect_partition<C: InventoryApi + ?Sized>(
    client: &C,
    partition: &Partition,
    options: &CollectOptions,
    prices: Option<&PriceTable>,
    now: DateTime<Utc>,
    shared: &SharedListings,
    sink: &RecordSink,
) -> Result<PartitionReport> {
    let listing = shared
        .snapshots
        .get_or_try_init(|| {
            let query = snapshot_query(
                partition.kind,
                &partition.scope,
                options.since_days,
                client.page_size(),
            );
            InventoryPager::new(client, query).collect_all()
        })
        .await?;

    let snapshots: Vec<RawAsset> = match &partition.scope.region {
        Some(wanted) => listing
            .iter()
            .filter(|s| region(s).as_deref() == Some(wanted.as_str()))
            .cloned()
            .collect(),
        None => listing.clone(),
    };
    log::debug!("{}: {} snapshots", partition.label(), snapshots.len());

    let lookup = SharedInstanceLookup {
        client,
        instances: &shared.instances,
    };
    let resolutions = resolve_all(&lookup, &snapshots, partition, options.batch).await;

    let mut report = PartitionReport {
        listed: snapshots.len(),
        ..Default::default()
    };
    for (snapshot, resolution) in snapshots.iter().zip(&resolutions) {
        match normalize(snapshot, partition.kind, resolution, prices, now) {
            Ok(record) if options.filter.keep(record.orphaned()) => {
                if record.orphaned() {
                    report.orphaned += 1;
                } else {
                    report.parented += 1;
                }
                sink.send(record)
                    .await
                    .map_err(|_| Error::Other("report writer stopped".into()))?;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Skipping snapshot in {}: {}", partition.label(), e);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

async fn resolve_all<L: AssetLookup + ?Sized>(
    lookup: &L,
    snapshots: &[RawAsset],
    partition: &Partition,
    batch: bool,
) -> Vec<Resolution> {
    let resolver = ParentResolver::new(lookup);
    if batch && partition.kind == SnapshotKind::Ebs {
        return resolver.resolve_ebs_batch(snapshots, &partition.scope).await;
    }

    let mut resolutions = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        resolutions.push(
            resolver
                .resolve(snapshot, partition.kind, &partition.scope)
                .await,
        );
    }
    resolutions
}

/// Totals for the end-of-run summary
#[derive(Debug, Default)]
pub struct CollectSummary {
    pub partitions: usize,
    /// `(partition label, error)` for each failed partition
    pub failed: Vec<(String, String)>,
    pub listed: usize,
    pub skipped: usize,
    pub orphaned: usize,
    pub parented: usize,
    pub elapsed: Duration,
}

impl CollectSummary {
    /// Records delivered to the sink
    pub fn records(&self) -> usize {
        self.orphaned + self.parented
    }

    pub fn log(&self) {
        log::info!(
            "Collected {} records ({} orphaned, {} with parent) from {} snapshots in {} partitions; {} skipped, {} partitions failed, {:.1}s",
            self.records(),
            self.orphaned,
            self.parented,
            self.listed,
            self.partitions,
            self.skipped,
            self.failed.len(),
            self.elapsed.as_secs_f64()
        );
        for (label, error) in &self.failed {
            log::error!("Partition {} failed: {}", label, error);
        }
    }
}

/// Collect every partition with bounded concurrency, streaming records to `sink`.
///
/// Records arrive in completion order. The sink closes when this returns, so
/// a receiver draining it alongside sees the end of the stream.
pub async fn collect<C: InventoryApi + 'static>(
    client: Arc<C>,
    options: CollectOptions,
    prices: Option<Arc<PriceTable>>,
    sink: RecordSink,
) -> CollectSummary {
    let started = Instant::now();
    let now = Utc::now();
    let parts = partitions(&options);
    let shared = Arc::new(shared_listings(&parts));
    let concurrency = options.concurrency;
    let options = Arc::new(options);

    let outcomes = fan_out(
        parts.clone(),
        |partition| {
            let client = Arc::clone(&client);
            let options = Arc::clone(&options);
            let shared = Arc::clone(&shared);
            let prices = prices.clone();
            let sink = sink.clone();
            async move {
                collect_partition(
                    &*client,
                    &partition,
                    &options,
                    prices.as_deref(),
                    now,
                    &shared[partition.index],
                    &sink,
                )
                .await
            }
        },
        concurrency,
    )
    .await;

    let mut summary = CollectSummary {
        partitions: parts.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => {
                summary.listed += report.listed;
                summary.skipped += report.skipped;
                summary.orphaned += report.orphaned;
                summary.parented += report.parented;
            }
            Err(e) => summary.failed.push((outcome.key.label(), e.to_string())),
        }
    }
    summary.elapsed = started.elapsed();
    summary
}
