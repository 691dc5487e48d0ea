//! Raw snapshot records to report rows
//!
//! Field extraction is best effort: anything missing or unparsable is left
//! blank (with a warning for data the report cannot do without) and never
//! fails the record. The only hard error is a snapshot without any id.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::pricing::{PriceTable, cost_since_creation};
use super::resolver::Resolution;
use super::{CanonicalSnapshotRecord, Cost, ParentInfo, RecordError, SnapshotKind, StorageTier};
use crate::client::models::{RawAsset, non_empty_str, value_as_f64};

/// Tag keys checked for the environment, in priority order (case-insensitive)
pub const ENVIRONMENT_TAG_KEYS: [&str; 3] = ["environment", "env", "Environment"];

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Build the report row for one snapshot.
///
/// `prices` is `None` when costs are disabled; both cost columns are then
/// the sentinel.
pub fn normalize(
    snapshot: &RawAsset,
    kind: SnapshotKind,
    resolution: &Resolution,
    prices: Option<&PriceTable>,
    now: DateTime<Utc>,
) -> Result<CanonicalSnapshotRecord, RecordError> {
    let snapshot_id = snapshot
        .first_str(&["assetId", "resourceId", "id"])
        .ok_or(RecordError::MissingSnapshotId)?
        .to_string();

    let creation_date = creation_date(snapshot);
    if creation_date.is_none() {
        log::warn!("Snapshot {} has no usable creation date", snapshot_id);
    }
    let age_days = creation_date.map_or(0, |created| age_in_days(created, now));

    let storage_tier = match kind {
        SnapshotKind::Ebs => snapshot
            .tf_str("storage_tier")
            .or_else(|| snapshot.str_field("storageTier"))
            .map(StorageTier::parse),
        SnapshotKind::Db => None,
    };

    let size_gb = size_gb(snapshot, kind, storage_tier.as_ref());
    if size_gb.is_none() {
        log::warn!(
            "Snapshot {} has no size (tier={})",
            snapshot_id,
            storage_tier.as_ref().map_or("unset", StorageTier::as_str)
        );
    }

    let region = region(snapshot).unwrap_or_default();
    if region.is_empty() {
        log::warn!("Snapshot {} has no region", snapshot_id);
    }

    let account_id = account_id(snapshot).unwrap_or_default();
    if account_id.is_empty() {
        log::warn!("Snapshot {} has no account id", snapshot_id);
    }

    let environment = environment(snapshot).unwrap_or_default();

    let parent = resolution
        .parent()
        .and_then(|parent| parent_info(parent, kind));

    let monthly_cost = match prices {
        Some(table) => table.monthly_cost(size_gb, &region, kind, storage_tier.as_ref()),
        None => Cost::PricesNotProvided,
    };
    let cost_since_creation = cost_since_creation(monthly_cost, age_days);

    Ok(CanonicalSnapshotRecord {
        snapshot_id,
        snapshot_type: kind,
        creation_date,
        age_days,
        size_gb,
        storage_tier,
        parent,
        account_id,
        region,
        environment,
        monthly_cost,
        cost_since_creation,
    })
}

/// Creation time from `resourceCreationDate`, `resource_creation_time` or
/// the Terraform object's `create_time`.
pub fn creation_date(snapshot: &RawAsset) -> Option<DateTime<Utc>> {
    let raw = snapshot
        .get("resourceCreationDate")
        .or_else(|| snapshot.get("resource_creation_time"))
        .or_else(|| snapshot.tf_field("create_time"))
        .or_else(|| snapshot.tf_field("snapshot_create_time"))
        .filter(|v| !v.is_null())?;

    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        log::warn!("Unparsable creation date {}", raw);
    }
    parsed
}

/// Epoch seconds (number or numeric string) or an RFC 3339 string
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    if let Some(epoch) = value_as_f64(raw) {
        if !epoch.is_finite() {
            return None;
        }
        let secs = epoch.trunc() as i64;
        let nanos = ((epoch.fract()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
        return Utc.timestamp_opt(secs, nanos).single();
    }
    let text = non_empty_str(raw)?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Whole days between `created` and `now`, 0 for future dates
pub fn age_in_days(created: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (now - created).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// Size in GB.
///
/// Standard-tier EBS snapshots use their full snapshot size, everything else
/// the source volume size. RDS snapshots use the allocated storage.
pub fn size_gb(snapshot: &RawAsset, kind: SnapshotKind, tier: Option<&StorageTier>) -> Option<f64> {
    match kind {
        SnapshotKind::Ebs => {
            let full = match tier {
                Some(StorageTier::Standard) => snapshot
                    .number("full_snapshot_size_in_bytes")
                    .map(|bytes| bytes / BYTES_PER_GB),
                _ => None,
            };
            full.or_else(|| snapshot.number("volume_size"))
        }
        SnapshotKind::Db => snapshot.number("allocated_storage"),
    }
}

/// Drop the availability zone letter (`us-east-1a` -> `us-east-1`)
pub fn strip_zone_letter(zone: &str) -> &str {
    let mut chars = zone.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(last), Some(prev)) if last.is_ascii_lowercase() && prev.is_ascii_digit() => {
            &zone[..zone.len() - 1]
        }
        _ => zone,
    }
}

/// Region from `region`, the availability zone, or the ARN
pub fn region(snapshot: &RawAsset) -> Option<String> {
    let zoned = snapshot
        .str_field("region")
        .or_else(|| snapshot.str_field("availabilityZone"))
        .or_else(|| snapshot.tf_str("availability_zone"));
    if let Some(value) = zoned {
        return Some(strip_zone_letter(value.trim()).to_string());
    }

    snapshot
        .arn()
        .and_then(|arn| arn.split(':').nth(3))
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Owning account
pub fn account_id(snapshot: &RawAsset) -> Option<String> {
    snapshot
        .str_field("providerId")
        .or_else(|| snapshot.tf_str("owner_id"))
        .or_else(|| snapshot.first_str(&["owner_id", "accountId"]))
        .map(str::to_string)
        .or_else(|| {
            // Account numbers sometimes arrive as JSON numbers
            snapshot
                .get("providerId")
                .and_then(Value::as_u64)
                .map(|n| n.to_string())
        })
}

/// Tags as ordered key/value pairs.
///
/// Sources in order: `tfObject.tags`, `tags`, `tagsList`; the first one with
/// any tags wins. Each may be a map, a list of `{key, value}` or
/// `{Key, Value}` objects, or a list of `"k=v"` strings.
pub fn tags(asset: &RawAsset) -> Vec<(String, String)> {
    [asset.tf_field("tags"), asset.get("tags"), asset.get("tagsList")]
        .into_iter()
        .flatten()
        .map(parse_tags)
        .find(|tags| !tags.is_empty())
        .unwrap_or_default()
}

fn parse_tags(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| tag_value(v).map(|v| (k.clone(), v)))
            .collect(),
        Value::Array(items) => items.iter().filter_map(parse_tag_item).collect(),
        _ => Vec::new(),
    }
}

fn parse_tag_item(item: &Value) -> Option<(String, String)> {
    match item {
        Value::String(pair) => {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        }
        Value::Object(map) => {
            let key = map.get("key").or_else(|| map.get("Key"))?.as_str()?;
            let value = map.get("value").or_else(|| map.get("Value"))?;
            Some((key.to_string(), tag_value(value)?))
        }
        _ => None,
    }
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty value among `keys`, matched case-insensitively
pub fn tag_lookup<'a>(tags: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|wanted| {
        tags.iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(wanted) && !value.trim().is_empty())
            .map(|(_, value)| value.as_str())
    })
}

/// Environment tag value
pub fn environment(snapshot: &RawAsset) -> Option<String> {
    tag_lookup(&tags(snapshot), &ENVIRONMENT_TAG_KEYS).map(str::to_string)
}

/// Parent columns for a resolved parent.
///
/// A parent record without any identifier cannot fill the id column, so it
/// is reported as orphaned.
pub fn parent_info(parent: &RawAsset, kind: SnapshotKind) -> Option<ParentInfo> {
    let Some(resource_id) = parent.natural_id() else {
        log::warn!("Resolved parent has no identifier; reporting snapshot as orphaned");
        return None;
    };

    let parent_tags = tags(parent);
    let name = tag_lookup(&parent_tags, &["Name"])
        .or_else(|| parent.str_field("name"))
        .unwrap_or(resource_id);

    let status_field = match kind {
        SnapshotKind::Ebs => "instance_state",
        SnapshotKind::Db => "db_instance_status",
    };
    let state = parent
        .str_field("state")
        .or_else(|| parent.tf_str(status_field))
        .or_else(|| parent.str_field(status_field))
        .or_else(|| parent.str_field("resourceStatus"))
        .unwrap_or("unknown");

    Some(ParentInfo {
        resource_type: kind.parent_label().to_string(),
        resource_id: resource_id.to_string(),
        name: name.to_string(),
        state: state.to_string(),
    })
}
