//! Snapshot parent resolution
//!
//! Every snapshot ends in exactly one of two states: [`Resolution::Resolved`]
//! with the parent record, or [`Resolution::Orphaned`]. Lookup failures are
//! logged at debug level and count as "not found"; resolution never fails.
//!
//! EBS parents are found by trying [`EbsStrategy::ORDER`] against the
//! evidence available for a volume. The individual path fetches evidence
//! lazily; the batch path prefetches volumes and instances for a whole
//! partition. Both apply the same strategies and the same finalize step,
//! so they agree on `orphaned` and the parent id for the same data.

use std::collections::HashMap;

use serde_json::Value;

use super::{Scope, SnapshotKind};
use crate::client::lookup::AssetLookup;
use crate::client::models::{RawAsset, non_empty_str};

/// Outcome of resolving one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(RawAsset),
    Orphaned,
}

impl Resolution {
    pub fn parent(&self) -> Option<&RawAsset> {
        match self {
            Resolution::Resolved(parent) => Some(parent),
            Resolution::Orphaned => None,
        }
    }

    pub fn is_orphaned(&self) -> bool {
        matches!(self, Resolution::Orphaned)
    }
}

/// Source volume of an EBS snapshot.
///
/// `tfObject.volume_id`, then `volumeId`/`volume_id`, then the last ARN
/// segment when the ARN names a volume.
pub fn ebs_volume_id(snapshot: &RawAsset) -> Option<String> {
    if let Some(id) = snapshot
        .tf_str("volume_id")
        .or_else(|| snapshot.first_str(&["volumeId", "volume_id"]))
    {
        return Some(id.to_string());
    }

    let arn = snapshot.arn()?;
    if !arn.contains("volume") {
        return None;
    }
    let id = arn.rsplit('/').next().filter(|s| !s.is_empty())?;
    log::debug!("Volume id {} taken from ARN {}", id, arn);
    Some(id.to_string())
}

/// Source database instance of an RDS snapshot
pub fn db_instance_identifier(snapshot: &RawAsset) -> Option<&str> {
    snapshot.tf_str("db_instance_identifier").or_else(|| {
        snapshot.first_str(&[
            "dbInstanceIdentifier",
            "db_instance_identifier",
            "sourceDbInstanceIdentifier",
        ])
    })
}

/// EC2 instances of one scope, indexed for parent lookups
#[derive(Debug, Default)]
pub struct InstanceIndex {
    by_id: HashMap<String, RawAsset>,
    /// volume id -> id of the first instance listing it as a block device
    by_volume: HashMap<String, String>,
}

impl InstanceIndex {
    pub fn new(instances: Vec<RawAsset>) -> Self {
        let mut index = Self::default();
        for instance in instances {
            let Some(id) = instance.resource_id().map(str::to_string) else {
                continue;
            };
            for volume_id in block_device_volumes(&instance) {
                index
                    .by_volume
                    .entry(volume_id.to_string())
                    .or_insert_with(|| id.clone());
            }
            index.by_id.entry(id).or_insert(instance);
        }
        index
    }

    pub fn get(&self, instance_id: &str) -> Option<&RawAsset> {
        self.by_id.get(instance_id)
    }

    /// First instance (in listing order) with a block device on `volume_id`
    pub fn referencing(&self, volume_id: &str) -> Option<&RawAsset> {
        self.by_volume
            .get(volume_id)
            .and_then(|id| self.by_id.get(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}

/// Volume ids in an instance's `tfObject.ebs_block_device`
fn block_device_volumes(instance: &RawAsset) -> impl Iterator<Item = &str> {
    instance
        .tf_field("ebs_block_device")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|device| device.get("volume_id").and_then(non_empty_str))
}

/// What is known about a volume when strategies run
#[derive(Debug, Clone, Copy, Default)]
pub struct EbsEvidence<'a> {
    pub volume: Option<&'a RawAsset>,
    pub instances: Option<&'a InstanceIndex>,
}

/// An instance id a strategy pointed at
#[derive(Debug, Clone, PartialEq)]
pub struct ParentCandidate {
    pub instance_id: String,
    /// Instance record found along the way, used if the detail fetch fails
    pub discovered: Option<RawAsset>,
}

/// Ways of finding the instance a volume belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbsStrategy {
    /// First entry of the volume's `attachments`
    VolumeAttachment,
    /// The volume's own `instanceId`/`instance_id`/`attachedInstanceId`
    AttachedInstanceField,
    /// An instance listing the volume under `ebs_block_device`
    BlockDeviceReference,
}

impl EbsStrategy {
    pub const ORDER: [EbsStrategy; 3] = [
        EbsStrategy::VolumeAttachment,
        EbsStrategy::AttachedInstanceField,
        EbsStrategy::BlockDeviceReference,
    ];

    /// Whether this strategy reads the instance listing
    pub fn needs_instances(&self) -> bool {
        matches!(self, EbsStrategy::BlockDeviceReference)
    }

    pub fn evaluate(&self, volume_id: &str, evidence: &EbsEvidence<'_>) -> Option<ParentCandidate> {
        match self {
            EbsStrategy::VolumeAttachment => {
                let volume = evidence.volume?;
                let attachments = volume
                    .get("attachments")
                    .or_else(|| volume.tf_field("attachments"))
                    .and_then(Value::as_array)?;
                let instance_id = attachments
                    .first()?
                    .get("instance_id")
                    .and_then(non_empty_str)?;
                Some(ParentCandidate {
                    instance_id: instance_id.to_string(),
                    discovered: None,
                })
            }
            EbsStrategy::AttachedInstanceField => {
                let instance_id = evidence.volume?.first_str(&[
                    "instanceId",
                    "instance_id",
                    "attachedInstanceId",
                ])?;
                Some(ParentCandidate {
                    instance_id: instance_id.to_string(),
                    discovered: None,
                })
            }
            EbsStrategy::BlockDeviceReference => {
                let instance = evidence.instances?.referencing(volume_id)?;
                Some(ParentCandidate {
                    instance_id: instance.resource_id()?.to_string(),
                    discovered: Some(instance.clone()),
                })
            }
        }
    }
}

/// Resolves snapshot parents through an [`AssetLookup`]
pub struct ParentResolver<'a, L: AssetLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: AssetLookup + ?Sized> ParentResolver<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Resolve one snapshot of either kind
    pub async fn resolve(&self, snapshot: &RawAsset, kind: SnapshotKind, scope: &Scope) -> Resolution {
        match kind {
            SnapshotKind::Ebs => self.resolve_ebs(snapshot, scope).await,
            SnapshotKind::Db => self.resolve_db(snapshot, scope).await,
        }
    }

    /// Individual EBS path: evidence is fetched only when a strategy needs it
    pub async fn resolve_ebs(&self, snapshot: &RawAsset, scope: &Scope) -> Resolution {
        let Some(volume_id) = ebs_volume_id(snapshot) else {
            log::debug!(
                "Snapshot {} has no volume id",
                snapshot.natural_id().unwrap_or("?")
            );
            return Resolution::Orphaned;
        };

        let volume = match self.lookup.get_volume(&volume_id, scope).await {
            Ok(volume) => volume,
            Err(err) => {
                log::debug!("Volume lookup for {} failed: {}", volume_id, err);
                None
            }
        };
        if volume.is_none() {
            log::debug!("Volume {} not in inventory, checking instances", volume_id);
        }

        let mut instances: Option<InstanceIndex> = None;
        let mut candidate = None;
        for strategy in EbsStrategy::ORDER {
            if strategy.needs_instances() && instances.is_none() {
                instances = Some(match self.lookup.list_instances(scope).await {
                    Ok(list) => InstanceIndex::new(list),
                    Err(err) => {
                        log::debug!("Instance listing for {} failed: {}", volume_id, err);
                        InstanceIndex::default()
                    }
                });
            }
            let evidence = EbsEvidence {
                volume: volume.as_ref(),
                instances: instances.as_ref(),
            };
            if let Some(found) = strategy.evaluate(&volume_id, &evidence) {
                log::debug!(
                    "Volume {} -> instance {} via {:?}",
                    volume_id,
                    found.instance_id,
                    strategy
                );
                candidate = Some(found);
                break;
            }
        }

        self.finalize(candidate, None, scope).await
    }

    /// Batch EBS path: one volume fetch and one instance listing for all
    /// snapshots of a scope. Results are returned in input order.
    pub async fn resolve_ebs_batch(&self, snapshots: &[RawAsset], scope: &Scope) -> Vec<Resolution> {
        if snapshots.is_empty() {
            return Vec::new();
        }

        let volume_ids: Vec<Option<String>> = snapshots.iter().map(ebs_volume_id).collect();
        let mut unique: Vec<String> = volume_ids.iter().flatten().cloned().collect();
        unique.sort();
        unique.dedup();

        let volumes = if unique.is_empty() {
            HashMap::new()
        } else {
            match self.lookup.get_volumes_batch(&unique, scope).await {
                Ok(volumes) => volumes,
                Err(err) => {
                    log::debug!("Batch volume lookup failed ({}): {}", scope.label(), err);
                    HashMap::new()
                }
            }
        };

        let index = if unique.is_empty() {
            InstanceIndex::default()
        } else {
            match self.lookup.list_instances(scope).await {
                Ok(list) => InstanceIndex::new(list),
                Err(err) => {
                    log::debug!("Batch instance listing failed ({}): {}", scope.label(), err);
                    InstanceIndex::default()
                }
            }
        };

        log::debug!(
            "Batch resolving {} snapshots against {} volumes and {} instances ({})",
            snapshots.len(),
            volumes.len(),
            index.len(),
            scope.label()
        );

        let mut results = Vec::with_capacity(snapshots.len());
        for volume_id in &volume_ids {
            let Some(volume_id) = volume_id else {
                results.push(Resolution::Orphaned);
                continue;
            };
            let evidence = EbsEvidence {
                volume: volumes.get(volume_id),
                instances: Some(&index),
            };
            let candidate = EbsStrategy::ORDER
                .iter()
                .find_map(|strategy| strategy.evaluate(volume_id, &evidence));
            results.push(self.finalize(candidate, Some(&index), scope).await);
        }
        results
    }

    /// Turn a candidate into the full parent record.
    ///
    /// Prefetched index first, then a detail fetch, then the record the
    /// strategy discovered.
    async fn finalize(
        &self,
        candidate: Option<ParentCandidate>,
        index: Option<&InstanceIndex>,
        scope: &Scope,
    ) -> Resolution {
        let Some(candidate) = candidate else {
            return Resolution::Orphaned;
        };

        if let Some(instance) = index.and_then(|idx| idx.get(&candidate.instance_id)) {
            return Resolution::Resolved(instance.clone());
        }

        match self.lookup.get_instance(&candidate.instance_id, scope).await {
            Ok(Some(instance)) => return Resolution::Resolved(instance),
            Ok(None) => log::debug!("Instance {} not in inventory", candidate.instance_id),
            Err(err) => log::debug!(
                "Instance lookup for {} failed: {}",
                candidate.instance_id,
                err
            ),
        }

        match candidate.discovered {
            Some(instance) => Resolution::Resolved(instance),
            None => Resolution::Orphaned,
        }
    }

    /// RDS path: identifier, then instance lookup
    pub async fn resolve_db(&self, snapshot: &RawAsset, scope: &Scope) -> Resolution {
        let Some(identifier) = db_instance_identifier(snapshot) else {
            log::debug!(
                "DB snapshot {} has no instance identifier",
                snapshot.natural_id().unwrap_or("?")
            );
            return Resolution::Orphaned;
        };

        match self.lookup.get_db_instance(identifier, scope).await {
            Ok(Some(instance)) => Resolution::Resolved(instance),
            Ok(None) => {
                log::debug!("DB instance {} not in inventory", identifier);
                Resolution::Orphaned
            }
            Err(err) => {
                log::debug!("DB instance lookup for {} failed: {}", identifier, err);
                Resolution::Orphaned
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fixtures::{AssetBuilder, running_instance};
    use crate::client::mock::MockInventoryClient;
    use crate::error::ApiError;

    fn scope() -> Scope {
        Scope::default()
    }

    #[test]
    fn test_volume_id_precedence() {
        let snap = AssetBuilder::ebs_snapshot("snap-1")
            .volume_id("vol-tf")
            .field("volumeId", "vol-top")
            .build();
        assert_eq!(ebs_volume_id(&snap).as_deref(), Some("vol-tf"));

        let snap = AssetBuilder::ebs_snapshot("snap-1")
            .field("volume_id", "vol-snake")
            .build();
        assert_eq!(ebs_volume_id(&snap).as_deref(), Some("vol-snake"));

        let snap = AssetBuilder::ebs_snapshot("snap-1")
            .arn("arn:aws:ec2:us-west-2::volume/vol-arn")
            .build();
        assert_eq!(ebs_volume_id(&snap).as_deref(), Some("vol-arn"));

        let snap = AssetBuilder::ebs_snapshot("snap-1")
            .arn("arn:aws:ec2:us-west-2::snapshot/snap-1")
            .build();
        assert_eq!(ebs_volume_id(&snap), None);
    }

    #[test]
    fn test_index_keeps_first_instance_per_volume() {
        let index = InstanceIndex::new(vec![
            AssetBuilder::instance("i-1").block_devices(&["vol-1"]).build(),
            AssetBuilder::instance("i-2").block_devices(&["vol-1", "vol-2"]).build(),
        ]);
        assert_eq!(index.referencing("vol-1").unwrap().resource_id(), Some("i-1"));
        assert_eq!(index.referencing("vol-2").unwrap().resource_id(), Some("i-2"));
        assert!(index.referencing("vol-3").is_none());
    }

    #[test]
    fn test_strategies_in_order() {
        let volume = AssetBuilder::volume("vol-1")
            .attached_to("i-attached")
            .field("instanceId", "i-field")
            .build();
        let evidence = EbsEvidence {
            volume: Some(&volume),
            instances: None,
        };
        let first = EbsStrategy::ORDER
            .iter()
            .find_map(|s| s.evaluate("vol-1", &evidence))
            .unwrap();
        assert_eq!(first.instance_id, "i-attached");

        let volume = AssetBuilder::volume("vol-1").field("instanceId", "i-field").build();
        let evidence = EbsEvidence {
            volume: Some(&volume),
            instances: None,
        };
        assert_eq!(
            EbsStrategy::AttachedInstanceField
                .evaluate("vol-1", &evidence)
                .unwrap()
                .instance_id,
            "i-field"
        );
        assert!(EbsStrategy::VolumeAttachment.evaluate("vol-1", &evidence).is_none());
    }

    #[tokio::test]
    async fn test_attached_volume_resolves_running_instance() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::volume("vol-1").attached_to("i-1").build(),
                running_instance("i-1"),
            ])
            .await;
        let snap = AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build();

        let resolution = ParentResolver::new(&mock).resolve_ebs(&snap, &scope()).await;

        let parent = resolution.parent().unwrap();
        assert_eq!(parent.resource_id(), Some("i-1"));
        assert_eq!(parent.str_field("state"), Some("running"));
        // Attachment found: the one instance query is the detail fetch by id
        let captured = mock.captured().await;
        let instance_queries: Vec<_> = captured
            .queries
            .iter()
            .filter(|q| q.asset_types.iter().any(|t| t == "aws_instance"))
            .collect();
        assert_eq!(instance_queries.len(), 1);
        assert_eq!(
            instance_queries[0].filters,
            Some(serde_json::json!({"resourceId": "i-1"}))
        );
    }

    #[tokio::test]
    async fn test_missing_volume_id_makes_no_lookups() {
        let mock = MockInventoryClient::new();
        let snap = AssetBuilder::ebs_snapshot("snap-1").build();

        let resolution = ParentResolver::new(&mock).resolve_ebs(&snap, &scope()).await;

        assert!(resolution.is_orphaned());
        assert_eq!(mock.call_counts().await.total(), 0);
    }

    #[tokio::test]
    async fn test_deleted_volume_found_through_block_device() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::instance("i-9").block_devices(&["vol-gone"]).build(),
            ])
            .await;
        let snap = AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-gone").build();

        let resolution = ParentResolver::new(&mock).resolve_ebs(&snap, &scope()).await;
        assert_eq!(resolution.parent().unwrap().resource_id(), Some("i-9"));
    }

    #[tokio::test]
    async fn test_detail_failure_falls_back_to_discovered_instance() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::instance("i-9").block_devices(&["vol-1"]).build(),
            ])
            .await;
        let snap = AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build();
        let resolver = ParentResolver::new(&mock);

        // The candidate carries the discovered record; a failing detail
        // fetch still resolves to it.
        let candidate = ParentCandidate {
            instance_id: "i-9".into(),
            discovered: Some(AssetBuilder::instance("i-9").build()),
        };
        let failing = MockInventoryClient::new()
            .with_error(ApiError::ServerError("boom".into()))
            .await;
        let resolution = ParentResolver::new(&failing)
            .finalize(Some(candidate), None, &scope())
            .await;
        assert_eq!(resolution.parent().unwrap().resource_id(), Some("i-9"));

        assert!(!resolver.resolve_ebs(&snap, &scope()).await.is_orphaned());
    }

    #[tokio::test]
    async fn test_attachment_to_unknown_instance_is_orphaned() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![AssetBuilder::volume("vol-1").attached_to("i-gone").build()])
            .await;
        let snap = AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build();

        let resolution = ParentResolver::new(&mock).resolve_ebs(&snap, &scope()).await;
        assert!(resolution.is_orphaned());
    }

    #[tokio::test]
    async fn test_lookup_errors_degrade_to_orphaned() {
        let mock = MockInventoryClient::new()
            .failing_asset_type("aws_ebs_volume")
            .await
            .failing_asset_type("aws_instance")
            .await;
        let snap = AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build();

        let resolution = ParentResolver::new(&mock).resolve_ebs(&snap, &scope()).await;
        assert!(resolution.is_orphaned());
    }

    #[tokio::test]
    async fn test_batch_and_individual_paths_agree() {
        let assets = vec![
            AssetBuilder::volume("vol-1").attached_to("i-1").build(),
            AssetBuilder::volume("vol-2").field("instance_id", "i-2").build(),
            AssetBuilder::volume("vol-3").attached_to("i-gone").build(),
            AssetBuilder::volume("vol-4").build(),
            running_instance("i-1"),
            AssetBuilder::instance("i-2").build(),
            AssetBuilder::instance("i-4").block_devices(&["vol-4", "vol-5"]).build(),
            AssetBuilder::instance("i-5").block_devices(&["vol-5"]).build(),
        ];
        let snapshots: Vec<RawAsset> = [
            Some("vol-1"),
            Some("vol-2"),
            Some("vol-3"),
            Some("vol-4"),
            Some("vol-5"),
            Some("vol-none"),
            None,
        ]
        .iter()
        .enumerate()
        .map(|(i, vol)| {
            let builder = AssetBuilder::ebs_snapshot(format!("snap-{}", i));
            match vol {
                Some(v) => builder.volume_id(v).build(),
                None => builder.build(),
            }
        })
        .collect();

        let mock = MockInventoryClient::new().with_assets(assets).await;
        let resolver = ParentResolver::new(&mock);

        let batch = resolver.resolve_ebs_batch(&snapshots, &scope()).await;
        assert_eq!(batch.len(), snapshots.len());

        for (snapshot, batched) in snapshots.iter().zip(&batch) {
            let single = resolver.resolve_ebs(snapshot, &scope()).await;
            assert_eq!(single.is_orphaned(), batched.is_orphaned());
            assert_eq!(
                single.parent().and_then(RawAsset::resource_id),
                batched.parent().and_then(RawAsset::resource_id)
            );
        }

        let ids: Vec<Option<&str>> = batch
            .iter()
            .map(|r| r.parent().and_then(RawAsset::resource_id))
            .collect();
        assert_eq!(
            ids,
            vec![Some("i-1"), Some("i-2"), None, Some("i-4"), Some("i-4"), None, None]
        );
    }

    #[tokio::test]
    async fn test_volume_named_after_another_id_does_not_split_paths() {
        let assets = vec![
            AssetBuilder::volume("vol-restored")
                .field("name", "vol-1")
                .attached_to("i-2")
                .build(),
            AssetBuilder::volume("vol-1").attached_to("i-1").build(),
            running_instance("i-1"),
            running_instance("i-2"),
        ];
        let snapshots = vec![AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build()];

        let mock = MockInventoryClient::new().with_assets(assets).await;
        let resolver = ParentResolver::new(&mock);

        let single = resolver.resolve_ebs(&snapshots[0], &scope()).await;
        let batch = resolver.resolve_ebs_batch(&snapshots, &scope()).await;

        assert_eq!(single.parent().and_then(RawAsset::resource_id), Some("i-1"));
        assert_eq!(batch[0].parent().and_then(RawAsset::resource_id), Some("i-1"));
    }

    #[tokio::test]
    async fn test_batch_uses_two_queries_for_partition() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::volume("vol-1").attached_to("i-1").build(),
                AssetBuilder::volume("vol-2").attached_to("i-1").build(),
                running_instance("i-1"),
            ])
            .await;
        let snapshots = vec![
            AssetBuilder::ebs_snapshot("snap-1").volume_id("vol-1").build(),
            AssetBuilder::ebs_snapshot("snap-2").volume_id("vol-2").build(),
        ];

        let results = ParentResolver::new(&mock)
            .resolve_ebs_batch(&snapshots, &scope())
            .await;

        assert!(results.iter().all(|r| !r.is_orphaned()));
        let counts = mock.call_counts().await;
        assert_eq!(counts.queries_for("aws_ebs_volume"), 1);
        assert_eq!(counts.queries_for("aws_instance"), 1);
    }

    #[tokio::test]
    async fn test_db_snapshot_resolution() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![AssetBuilder::db_instance("orders").state("available").build()])
            .await;
        let resolver = ParentResolver::new(&mock);

        let snap = AssetBuilder::db_snapshot("rds:orders-1")
            .tf("db_instance_identifier", "orders")
            .build();
        let resolution = resolver.resolve(&snap, SnapshotKind::Db, &scope()).await;
        assert_eq!(resolution.parent().unwrap().str_field("name"), Some("orders"));

        let snap = AssetBuilder::db_snapshot("rds:old-1")
            .field("sourceDbInstanceIdentifier", "deleted-db")
            .build();
        assert!(resolver.resolve(&snap, SnapshotKind::Db, &scope()).await.is_orphaned());

        let snap = AssetBuilder::db_snapshot("rds:none").build();
        assert!(resolver.resolve(&snap, SnapshotKind::Db, &scope()).await.is_orphaned());
    }
}
