//! Inventory asset records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inventory asset type for EBS snapshots
pub const ASSET_EBS_SNAPSHOT: &str = "aws_ebs_snapshot";
/// Inventory asset type for RDS snapshots
pub const ASSET_DB_SNAPSHOT: &str = "aws_db_snapshot";
/// Inventory asset type for EBS volumes
pub const ASSET_EBS_VOLUME: &str = "aws_ebs_volume";
/// Inventory asset type for EC2 instances
pub const ASSET_EC2_INSTANCE: &str = "aws_instance";
/// Inventory asset type for RDS instances
pub const ASSET_DB_INSTANCE: &str = "aws_db_instance";

/// An inventory record exactly as the API returned it.
///
/// Field names differ between providers and asset types, so the record is
/// kept as raw JSON and read through the accessors below. Strings only
/// count as present when non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAsset(Value);

impl RawAsset {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Top-level non-empty string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(non_empty_str)
    }

    /// First non-empty string among `keys`, in order
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.str_field(key))
    }

    /// The provider-specific Terraform object, if present
    pub fn tf_object(&self) -> Option<&Map<String, Value>> {
        self.get("tfObject").and_then(Value::as_object)
    }

    /// Field of the Terraform object
    pub fn tf_field(&self, key: &str) -> Option<&Value> {
        self.tf_object().and_then(|tf| tf.get(key))
    }

    /// Non-empty string field of the Terraform object
    pub fn tf_str(&self, key: &str) -> Option<&str> {
        self.tf_field(key).and_then(non_empty_str)
    }

    /// Numeric field, looked up in the Terraform object first
    pub fn number(&self, key: &str) -> Option<f64> {
        self.tf_field(key)
            .and_then(value_as_f64)
            .or_else(|| self.get(key).and_then(value_as_f64))
    }

    pub fn asset_type(&self) -> Option<&str> {
        self.str_field("assetType")
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.str_field("resourceId")
    }

    pub fn asset_id(&self) -> Option<&str> {
        self.str_field("assetId")
    }

    pub fn arn(&self) -> Option<&str> {
        self.str_field("arn")
    }

    /// Natural identifier: `resourceId`, then `assetId`, then `id`
    pub fn natural_id(&self) -> Option<&str> {
        self.first_str(&["resourceId", "assetId", "id"])
    }
}

impl From<Value> for RawAsset {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Non-empty string content of a JSON value
pub fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

/// Numeric content of a JSON number or numeric string
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
