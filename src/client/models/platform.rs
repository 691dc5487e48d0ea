//! Codify, integration, governance and workspace API models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cloud integration (data source) registered on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub account_number: Option<String>,

    #[serde(default)]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub account_id: Option<String>,
}

impl Integration {
    /// Account identifier the inventory is keyed by
    pub fn account(&self) -> Option<&str> {
        [&self.account_number, &self.provider_id, &self.account_id]
            .into_iter()
            .find_map(|v| v.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Governance policy returned by the insights endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceInsight {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    /// Asset types the policy applies to
    #[serde(rename = "type", default)]
    pub asset_types: Vec<String>,

    #[serde(default)]
    pub total_assets: Option<u64>,
}

/// Insights response; the API has used both `hits` and `data`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub hits: Vec<GovernanceInsight>,

    #[serde(default)]
    pub data: Vec<GovernanceInsight>,
}

impl InsightsResponse {
    pub fn into_first(self) -> Option<GovernanceInsight> {
        self.hits.into_iter().chain(self.data).next()
    }
}

/// Request body for a single codify call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodifyRequest {
    pub asset_type: String,
    pub asset_id: String,
    pub iac_type: String,
    pub provider: String,
    pub account_number: String,
}

impl CodifyRequest {
    /// Names of required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("assetType", &self.asset_type),
            ("assetId", &self.asset_id),
            ("iacType", &self.iac_type),
            ("provider", &self.provider),
            ("accountNumber", &self.account_number),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Generated configuration for one asset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodifyResponse {
    #[serde(default)]
    pub codified_result: Option<String>,

    /// Either a single block or a list of blocks
    #[serde(default)]
    pub import_blocks: Option<Value>,

    #[serde(default)]
    pub import_command: Option<String>,

    #[serde(default)]
    pub provider_block: Option<String>,
}

impl CodifyResponse {
    /// Import blocks flattened to text
    pub fn import_block_texts(&self) -> Vec<String> {
        match &self.import_blocks {
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Workspace execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceExecution {
    pub triggers: Vec<String>,
    pub apply_rule: String,
    pub terraform_version: String,
}

/// Workspace variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceVariable {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub sensitivity: String,
    #[serde(default)]
    pub destination: String,
}

/// Request body for workspace creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    pub runner_type: String,
    pub iac_type: String,
    pub workspace_name: String,
    pub vcs_id: String,
    pub repo: String,
    pub default_branch: String,
    pub vcs_type: String,
    pub work_dir: String,
    pub variables: Vec<WorkspaceVariable>,
    pub execution: WorkspaceExecution,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub consumed_variable_sets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integration_account_fallbacks() {
        let integration: Integration =
            serde_json::from_value(json!({"name": "prod", "accountNumber": "", "providerId": "123"}))
                .unwrap();
        assert_eq!(integration.account(), Some("123"));
    }

    #[test]
    fn test_insights_prefers_hits_then_data() {
        let resp: InsightsResponse = serde_json::from_value(json!({
            "data": [{"name": "Open S3", "type": ["aws_s3_bucket"]}]
        }))
        .unwrap();
        let policy = resp.into_first().unwrap();
        assert_eq!(policy.name, "Open S3");
        assert_eq!(policy.asset_types, vec!["aws_s3_bucket"]);
    }

    #[test]
    fn test_codify_request_serializes_camel_case() {
        let req = CodifyRequest {
            asset_type: "aws_s3_bucket".into(),
            asset_id: "arn:aws:s3:::logs".into(),
            iac_type: "terraform".into(),
            provider: "aws".into(),
            account_number: "123456789012".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["assetType"], "aws_s3_bucket");
        assert_eq!(value["accountNumber"], "123456789012");
        assert!(req.missing_fields().is_empty());
    }

    #[test]
    fn test_codify_request_missing_fields() {
        let req = CodifyRequest {
            asset_type: "aws_s3_bucket".into(),
            asset_id: String::new(),
            iac_type: "terraform".into(),
            provider: "aws".into(),
            account_number: " ".into(),
        };
        assert_eq!(req.missing_fields(), vec!["assetId", "accountNumber"]);
    }

    #[test]
    fn test_import_blocks_accepts_string_or_list() {
        let single: CodifyResponse =
            serde_json::from_value(json!({"importBlocks": "import {}"})).unwrap();
        assert_eq!(single.import_block_texts().len(), 1);

        let many: CodifyResponse =
            serde_json::from_value(json!({"importBlocks": ["import {}", "", "import {}"]})).unwrap();
        assert_eq!(many.import_block_texts().len(), 2);
    }

    #[test]
    fn test_workspace_request_omits_empty_optionals() {
        let req = CreateWorkspaceRequest {
            runner_type: "firefly".into(),
            iac_type: "terraform".into(),
            workspace_name: "infra/network".into(),
            vcs_id: "vcs-1".into(),
            repo: "acme/infra".into(),
            default_branch: "main".into(),
            vcs_type: "github".into(),
            work_dir: "/network".into(),
            variables: vec![],
            execution: WorkspaceExecution {
                triggers: vec!["merge".into()],
                apply_rule: "manual".into(),
                terraform_version: "1.5.7".into(),
            },
            description: "Workspace for network".into(),
            project: None,
            consumed_variable_sets: vec![],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("project").is_none());
        assert!(value.get("consumedVariableSets").is_none());
        assert_eq!(value["execution"]["terraformVersion"], "1.5.7");
        assert_eq!(value["workDir"], "/network");
    }
}
