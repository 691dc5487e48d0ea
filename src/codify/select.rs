//! Which inventory assets become codify requests

use crate::client::models::{CodifyRequest, RawAsset};
use crate::client::pagination::InventoryQuery;

use super::Provider;

/// Terraform fields searched for tags
const TAG_FIELDS: [&str; 3] = ["tags", "tags_all", "resource_tags"];

/// Asset type that is only accepted with an AWS Config ARN
const CONFIG_RULE_TYPE: &str = "aws_config_config_rule";
const CONFIG_RULE_ARN_PREFIX: &str = "arn:aws:config:";

pub const RESOURCE_GROUP_TYPE: &str = "azurerm_resource_group";

/// Inventory filters for a codify run
#[derive(Debug, Clone, Default)]
pub struct CodifyFilters {
    pub asset_types: Vec<String>,
    pub names: Vec<String>,
    pub arns: Vec<String>,
    pub since_days: Option<u32>,
    pub asset_state: Option<String>,
    pub resource_groups: Vec<String>,
    /// Keep assets carrying any of these tags
    pub tags: Vec<(String, String)>,
    pub max_resources: Option<usize>,
}

/// Inventory query for the account's candidate assets
pub fn inventory_query(
    provider: Provider,
    account: &str,
    filters: &CodifyFilters,
    page_size: usize,
) -> InventoryQuery {
    let mut query = InventoryQuery::new()
        .page_size(page_size)
        .provider_type(provider.api_name())
        .provider_id(account)
        .asset_types(filters.asset_types.iter().cloned())
        .names(filters.names.iter().cloned())
        .arns(filters.arns.iter().cloned());
    if let Some(state) = &filters.asset_state {
        query = query.asset_state(state.clone());
    }
    if let Some(days) = filters.since_days {
        query = query.created_within_days(days);
    }
    if provider == Provider::Azure {
        query = query.resource_groups(filters.resource_groups.iter().cloned());
    }
    query
}

/// Whether the asset's Terraform object carries any of `tags`
pub fn tag_matches(asset: &RawAsset, tags: &[(String, String)]) -> bool {
    if tags.is_empty() {
        return true;
    }
    TAG_FIELDS.iter().any(|field| {
        asset
            .tf_field(field)
            .and_then(|v| v.as_object())
            .is_some_and(|map| {
                tags.iter()
                    .any(|(k, v)| map.get(k).and_then(|x| x.as_str()) == Some(v.as_str()))
            })
    })
}

/// Whether an Azure resource id lies in one of `groups` (case-insensitive)
pub fn in_resource_groups(asset: &RawAsset, groups: &[String]) -> bool {
    if groups.is_empty() {
        return true;
    }
    let id = asset.resource_id().unwrap_or_default().to_lowercase();
    groups
        .iter()
        .any(|rg| id.contains(&format!("/resourcegroups/{}/", rg.to_lowercase())))
}

/// Codify request for one asset.
///
/// AWS assets are addressed by ARN when they have one; Azure assets by
/// their inventory asset id. AWS Config rules are skipped unless addressed
/// by a Config ARN. The request may still lack fields; see
/// [`CodifyRequest::missing_fields`].
pub fn build_request(asset: &RawAsset, provider: Provider, account: &str) -> Option<CodifyRequest> {
    let asset_type = asset.asset_type().unwrap_or_default();
    let asset_id = match provider {
        Provider::Aws => asset.first_str(&["arn", "resourceId", "assetId"])?,
        Provider::Azure => asset.asset_id()?,
    };

    if asset_type == CONFIG_RULE_TYPE && !asset_id.starts_with(CONFIG_RULE_ARN_PREFIX) {
        log::debug!("Skipping config rule without a Config ARN: {}", asset_id);
        return None;
    }

    let account_number = match provider {
        Provider::Aws => asset
            .first_str(&["providerId", "accountNumber"])
            .unwrap_or(account),
        Provider::Azure => account,
    };

    Some(CodifyRequest {
        asset_type: asset_type.to_string(),
        asset_id: asset_id.to_string(),
        iac_type: "terraform".to_string(),
        provider: provider.api_name().to_string(),
        account_number: account_number.to_string(),
    })
}

/// Filter assets and turn them into requests, honouring `max_resources`
pub fn select(
    assets: &[RawAsset],
    provider: Provider,
    account: &str,
    filters: &CodifyFilters,
) -> Vec<CodifyRequest> {
    let mut requests: Vec<CodifyRequest> = assets
        .iter()
        .filter(|a| tag_matches(a, &filters.tags))
        .filter(|a| provider != Provider::Azure || in_resource_groups(a, &filters.resource_groups))
        .filter_map(|a| build_request(a, provider, account))
        .collect();
    if let Some(max) = filters.max_resources {
        requests.truncate(max);
    }
    requests
}

/// Requests that codify the Azure resource groups themselves
pub fn resource_group_requests(subscription: &str, groups: &[String]) -> Vec<CodifyRequest> {
    groups
        .iter()
        .map(|rg| CodifyRequest {
            asset_type: RESOURCE_GROUP_TYPE.to_string(),
            asset_id: format!(
                "arn:azurerm::::/subscriptions/{}/resourceGroups/{}",
                subscription, rg
            ),
            iac_type: "terraform".to_string(),
            provider: Provider::Azure.api_name().to_string(),
            account_number: subscription.to_string(),
        })
        .collect()
}

/// Parse a `KEY=VALUE` argument
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
