//! Test fixtures and builders for inventory records
//!
//! Provides builder patterns for creating raw inventory assets with the
//! field layout the Inventory API uses.
//! Import via `use crate::client::fixtures::*` in test modules.

#![allow(dead_code)] // Builder methods are available for future tests

use serde_json::{Map, Value, json};

use super::models::{
    ASSET_DB_INSTANCE, ASSET_DB_SNAPSHOT, ASSET_EBS_SNAPSHOT, ASSET_EBS_VOLUME,
    ASSET_EC2_INSTANCE, RawAsset,
};

// ============================================================================
// AssetBuilder
// ============================================================================

/// Builder for creating test RawAsset instances.
///
/// # Example
/// ```ignore
/// let snapshot = AssetBuilder::ebs_snapshot("snap-1")
///     .volume_id("vol-1")
///     .region("us-east-1")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct AssetBuilder {
    fields: Map<String, Value>,
    tf: Map<String, Value>,
}

impl AssetBuilder {
    /// Create a builder for an asset of `asset_type` with `resourceId` set.
    pub fn new(asset_type: &str, resource_id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("assetType".into(), json!(asset_type));
        fields.insert("resourceId".into(), json!(resource_id.into()));
        Self {
            fields,
            tf: Map::new(),
        }
    }

    pub fn ebs_snapshot(id: impl Into<String>) -> Self {
        Self::new(ASSET_EBS_SNAPSHOT, id)
    }

    pub fn db_snapshot(id: impl Into<String>) -> Self {
        Self::new(ASSET_DB_SNAPSHOT, id)
    }

    pub fn volume(id: impl Into<String>) -> Self {
        Self::new(ASSET_EBS_VOLUME, id)
    }

    pub fn instance(id: impl Into<String>) -> Self {
        Self::new(ASSET_EC2_INSTANCE, id)
    }

    pub fn db_instance(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self::new(ASSET_DB_INSTANCE, format!("db-{}", identifier)).field("name", identifier)
    }

    /// Set a top-level field
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Set a `tfObject` field
    pub fn tf(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.tf.insert(key.to_string(), value.into());
        self
    }

    /// Remove a top-level field
    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn asset_id(self, id: &str) -> Self {
        self.field("assetId", id)
    }

    pub fn arn(self, arn: &str) -> Self {
        self.field("arn", arn)
    }

    pub fn account(self, account: &str) -> Self {
        self.field("providerId", account)
    }

    pub fn region(self, region: &str) -> Self {
        self.field("region", region)
    }

    pub fn state(self, state: &str) -> Self {
        self.field("state", state)
    }

    /// Creation time as epoch seconds
    pub fn created(self, epoch: i64) -> Self {
        self.field("resourceCreationDate", epoch)
    }

    /// Snapshot's source volume (`tfObject.volume_id`)
    pub fn volume_id(self, volume_id: &str) -> Self {
        self.tf("volume_id", volume_id)
    }

    /// Volume attachment to an instance
    pub fn attached_to(self, instance_id: &str) -> Self {
        self.field("attachments", json!([{ "instance_id": instance_id }]))
    }

    /// Instance block device entries naming these volumes
    pub fn block_devices(self, volume_ids: &[&str]) -> Self {
        let devices: Vec<Value> = volume_ids
            .iter()
            .enumerate()
            .map(|(i, v)| json!({ "device_name": format!("/dev/sd{}", (b'f' + i as u8) as char), "volume_id": v }))
            .collect();
        self.tf("ebs_block_device", devices)
    }

    /// Tags as a `tfObject.tags` map
    pub fn tags(self, tags: &[(&str, &str)]) -> Self {
        let map: Map<String, Value> = tags
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        self.tf("tags", Value::Object(map))
    }

    pub fn build(self) -> RawAsset {
        let mut fields = self.fields;
        if !self.tf.is_empty() {
            fields.insert("tfObject".into(), Value::Object(self.tf));
        }
        RawAsset::new(Value::Object(fields))
    }
}

/// A running instance with a name tag
pub fn running_instance(id: &str) -> RawAsset {
    AssetBuilder::instance(id)
        .state("running")
        .tags(&[("Name", "web")])
        .build()
}
