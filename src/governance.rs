//! Resources flagged by a governance policy
//!
//! The policy's name and asset types come from the insights endpoint; the
//! inventory is then queried once per asset state with the policy as a
//! governance filter.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tabled::Tabled;

use crate::cli::OutputFormat;
use crate::client::api::{InventoryApi, PlatformApi};
use crate::client::models::{GovernanceInsight, RawAsset};
use crate::client::pagination::{InventoryPager, InventoryQuery};
use crate::error::{ApiError, Result};
use crate::output::{Formattable, json, table};

/// Asset states queried when none are given
pub const DEFAULT_ASSET_STATES: [&str; 4] = ["managed", "unmanaged", "ghost", "modified"];

/// Outcome of the query for one asset state
#[derive(Debug, Clone, Serialize)]
pub struct StateResult {
    pub state: String,
    pub assets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ARNs matched by a policy, deduplicated in first-seen order
#[derive(Debug, Clone, Serialize)]
pub struct PolicyArns {
    pub policy_name: String,
    pub asset_types: Vec<String>,
    pub arns: Vec<String>,
    pub states: Vec<StateResult>,
}

impl PolicyArns {
    pub fn failed_states(&self) -> impl Iterator<Item = &StateResult> {
        self.states.iter().filter(|s| s.error.is_some())
    }

    /// Write one ARN per line
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut content = self.arns.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Tabled, Serialize)]
struct ArnRow<'a> {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ARN")]
    arn: &'a str,
}

impl Formattable for PolicyArns {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table => {
                let rows: Vec<ArnRow<'_>> = self
                    .arns
                    .iter()
                    .enumerate()
                    .map(|(i, arn)| ArnRow { index: i + 1, arn })
                    .collect();
                Ok(table::format_table(&rows))
            }
            OutputFormat::Json => Ok(serde_json::to_string_pretty(
                &json::JsonOutput::new(self).with_count(self.arns.len()),
            )?),
            OutputFormat::Plain => Ok(self.arns.join("\n")),
        }
    }
}

/// Preferred identifier of a matched asset
pub fn preferred_arn(asset: &RawAsset) -> Option<&str> {
    asset.first_str(&["arn", "resourceId", "assetId"])
}

/// Inventory query for one asset state of a policy
pub fn policy_query(policy: &GovernanceInsight, state: &str, page_size: usize) -> InventoryQuery {
    InventoryQuery::new()
        .page_size(page_size)
        .governance(policy.name.clone())
        .asset_state(state)
        .asset_types(policy.asset_types.iter().cloned())
}

/// Look up `policy_id` and collect the ARNs it matches in each state.
///
/// A failing state is recorded in the result and the other states are
/// still queried. A policy that does not exist is an error.
pub async fn list_policy_arns<C>(client: &C, policy_id: &str, states: &[String]) -> Result<PolicyArns>
where
    C: InventoryApi + PlatformApi + ?Sized,
{
    let policy = client
        .governance_policy(policy_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("governance policy {}", policy_id)))?;
    log::info!(
        "Policy '{}' covers {} asset types",
        policy.name,
        policy.asset_types.len()
    );

    let mut seen = HashSet::new();
    let mut result = PolicyArns {
        policy_name: policy.name.clone(),
        asset_types: policy.asset_types.clone(),
        arns: Vec::new(),
        states: Vec::with_capacity(states.len()),
    };

    for state in states {
        let query = policy_query(&policy, state, client.page_size());
        match InventoryPager::new(client, query).collect_all().await {
            Ok(assets) => {
                log::info!("{}: {} assets", state, assets.len());
                for arn in assets.iter().filter_map(preferred_arn) {
                    if seen.insert(arn.to_string()) {
                        result.arns.push(arn.to_string());
                    }
                }
                result.states.push(StateResult {
                    state: state.clone(),
                    assets: assets.len(),
                    error: None,
                });
            }
            Err(e) => {
                log::warn!("Query for state '{}' failed: {}", state, e);
                result.states.push(StateResult {
                    state: state.clone(),
                    assets: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(result)
}
