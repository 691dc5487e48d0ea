//! Mock Inventory API client for testing
//!
//! Provides an in-memory implementation of the API traits for unit testing
//! without making real API calls. Queries are evaluated against a list of
//! raw assets with the same filter semantics the server applies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::api::{InventoryApi, PlatformApi};
use super::models::{
    CodifyRequest, CodifyResponse, CreateWorkspaceRequest, GovernanceInsight, Integration,
    RawAsset,
};
use super::pagination::{Cursor, InventoryPage, InventoryQuery, MAX_PAGE_SIZE};
use crate::error::{ApiError, Result};

/// Mock API client for testing.
///
/// Configure the inventory and platform responses via builder methods,
/// then use in tests.
///
/// # Example
/// ```ignore
/// let mock = MockInventoryClient::new()
///     .with_assets(vec![AssetBuilder::volume("vol-1").build()])
///     .await;
///
/// let volume = mock.get_volume("vol-1", &Scope::default()).await?;
/// assert!(volume.is_some());
/// ```
pub struct MockInventoryClient {
    /// Inventory records every query is evaluated against
    assets: Arc<Mutex<Vec<RawAsset>>>,
    /// Whether full pages carry an `afterKey`
    cursors: Arc<Mutex<bool>>,
    /// Asset types whose queries always fail
    failing_asset_types: Arc<Mutex<HashSet<String>>>,
    /// Asset states whose queries always fail
    failing_asset_states: Arc<Mutex<HashSet<String>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Integrations to return from list_integrations
    integrations: Arc<Mutex<Vec<Integration>>>,
    /// Policy to return from governance_policy
    policy: Arc<Mutex<Option<GovernanceInsight>>>,
    /// Asset ids the codify endpoint rejects
    failing_codify: Arc<Mutex<HashSet<String>>>,
    /// Workspace names the create endpoint rejects
    failing_workspaces: Arc<Mutex<HashSet<String>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Captured requests for test assertions
    captured: Arc<Mutex<Captured>>,
}

impl Default for MockInventoryClient {
    fn default() -> Self {
        Self {
            assets: Arc::new(Mutex::new(Vec::new())),
            cursors: Arc::new(Mutex::new(true)),
            failing_asset_types: Arc::new(Mutex::new(HashSet::new())),
            failing_asset_states: Arc::new(Mutex::new(HashSet::new())),
            error: Arc::new(Mutex::new(None)),
            integrations: Arc::new(Mutex::new(Vec::new())),
            policy: Arc::new(Mutex::new(None)),
            failing_codify: Arc::new(Mutex::new(HashSet::new())),
            failing_workspaces: Arc::new(Mutex::new(HashSet::new())),
            call_count: Arc::new(Mutex::new(CallCounts::default())),
            captured: Arc::new(Mutex::new(Captured::default())),
        }
    }
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub query: usize,
    pub list_integrations: usize,
    pub governance_policy: usize,
    pub codify: usize,
    pub create_workspace: usize,
    /// Inventory queries per requested asset type
    pub by_asset_type: HashMap<String, usize>,
}

impl CallCounts {
    /// Get total number of API calls made.
    pub fn total(&self) -> usize {
        self.query
            + self.list_integrations
            + self.governance_policy
            + self.codify
            + self.create_workspace
    }

    /// Inventory queries that asked for `asset_type`
    pub fn queries_for(&self, asset_type: &str) -> usize {
        self.by_asset_type.get(asset_type).copied().unwrap_or(0)
    }
}

/// Request bodies captured for test assertions
#[derive(Default, Debug, Clone)]
pub struct Captured {
    pub queries: Vec<InventoryQuery>,
    pub codify: Vec<CodifyRequest>,
    pub workspaces: Vec<CreateWorkspaceRequest>,
}

impl MockInventoryClient {
    /// Create a new mock client with default (empty) responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the inventory records queries run against.
    pub async fn with_assets(self, assets: Vec<RawAsset>) -> Self {
        *self.assets.lock().await = assets;
        self
    }

    /// Return pages without an `afterKey`, as an API that ignores
    /// pagination would.
    pub async fn without_cursors(self) -> Self {
        *self.cursors.lock().await = false;
        self
    }

    /// Make every query for `asset_type` fail with a server error.
    pub async fn failing_asset_type(self, asset_type: &str) -> Self {
        self.failing_asset_types
            .lock()
            .await
            .insert(asset_type.to_string());
        self
    }

    /// Make every query filtered on `state` fail with a server error.
    pub async fn failing_asset_state(self, state: &str) -> Self {
        self.failing_asset_states
            .lock()
            .await
            .insert(state.to_string());
        self
    }

    /// Configure an error to return on the next API call.
    /// The error is consumed after one use.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    /// Configure integrations to return from list_integrations.
    pub async fn with_integrations(self, integrations: Vec<Integration>) -> Self {
        *self.integrations.lock().await = integrations;
        self
    }

    /// Configure the governance policy to return.
    pub async fn with_policy(self, policy: GovernanceInsight) -> Self {
        *self.policy.lock().await = Some(policy);
        self
    }

    /// Make codify fail for one asset id.
    pub async fn failing_codify(self, asset_id: &str) -> Self {
        self.failing_codify.lock().await.insert(asset_id.to_string());
        self
    }

    /// Make workspace creation fail for one workspace name.
    pub async fn failing_workspace(self, name: &str) -> Self {
        self.failing_workspaces.lock().await.insert(name.to_string());
        self
    }

    /// Get the call counts for verification in tests.
    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Get all captured requests for test assertions.
    pub async fn captured(&self) -> Captured {
        self.captured.lock().await.clone()
    }

    /// Check if there's a pending error and consume it.
    async fn check_error(&self) -> Result<()> {
        let mut error = self.error.lock().await;
        if let Some(e) = error.take() {
            return Err(e.into());
        }
        Ok(())
    }
}

/// Whether `asset` passes every server-side filter in `query`
fn matches_query(asset: &RawAsset, query: &InventoryQuery) -> bool {
    let in_list = |list: &[String], value: Option<&str>| {
        list.is_empty() || value.is_some_and(|v| list.iter().any(|item| item == v))
    };

    if !in_list(&query.asset_types, asset.asset_type()) {
        return false;
    }
    if !in_list(&query.provider_ids, asset.str_field("providerId")) {
        return false;
    }
    if !in_list(&query.arns, asset.arn()) {
        return false;
    }
    if !query.names.is_empty() {
        let named = [asset.resource_id(), asset.str_field("name"), asset.asset_id()]
            .into_iter()
            .flatten()
            .any(|id| query.names.iter().any(|n| n == id));
        if !named {
            return false;
        }
    }
    if let Some(state) = &query.asset_state {
        if asset.str_field("assetState") != Some(state.as_str()) {
            return false;
        }
    }
    if let Some(policy) = &query.governance {
        let flagged = asset
            .get("governance")
            .and_then(Value::as_array)
            .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(policy.as_str())));
        if !flagged {
            return false;
        }
    }
    match query.filters.as_ref().and_then(|f| f.get("resourceId")) {
        Some(Value::String(id)) => asset.resource_id() == Some(id.as_str()),
        Some(Value::Object(filter)) => {
            let ids = filter.get("$in").and_then(Value::as_array);
            ids.is_some_and(|ids| {
                ids.iter()
                    .any(|id| id.as_str().is_some() && id.as_str() == asset.resource_id())
            })
        }
        _ => true,
    }
}

// ============================================================================
// InventoryApi Implementation
// ============================================================================

#[async_trait]
impl InventoryApi for MockInventoryClient {
    async fn query(
        &self,
        query: &InventoryQuery,
        cursor: Option<&Cursor>,
    ) -> Result<InventoryPage> {
        {
            let mut counts = self.call_count.lock().await;
            counts.query += 1;
            for asset_type in &query.asset_types {
                *counts.by_asset_type.entry(asset_type.clone()).or_default() += 1;
            }
        }
        self.captured.lock().await.queries.push(query.clone());
        self.check_error().await?;

        {
            let failing = self.failing_asset_types.lock().await;
            if let Some(asset_type) = query.asset_types.iter().find(|t| failing.contains(*t)) {
                return Err(ApiError::ServerError(format!("{} query failed", asset_type)).into());
            }
        }
        if let Some(state) = &query.asset_state {
            if self.failing_asset_states.lock().await.contains(state) {
                return Err(ApiError::ServerError(format!("{} query failed", state)).into());
            }
        }

        let offset = cursor.and_then(Value::as_u64).unwrap_or(0) as usize;
        let matching: Vec<RawAsset> = self
            .assets
            .lock()
            .await
            .iter()
            .filter(|asset| matches_query(asset, query))
            .cloned()
            .collect();

        let page: Vec<RawAsset> = matching.into_iter().skip(offset).take(query.size).collect();
        let next = offset + page.len();
        let after_key = if *self.cursors.lock().await && page.len() == query.size {
            Some(json!(next))
        } else {
            None
        };

        Ok(InventoryPage {
            response_objects: page,
            after_key,
        })
    }

    fn page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }
}

// ============================================================================
// PlatformApi Implementation
// ============================================================================

#[async_trait]
impl PlatformApi for MockInventoryClient {
    async fn list_integrations(&self, _provider: &str) -> Result<Vec<Integration>> {
        self.check_error().await?;
        self.call_count.lock().await.list_integrations += 1;
        Ok(self.integrations.lock().await.clone())
    }

    async fn governance_policy(&self, _policy_id: &str) -> Result<Option<GovernanceInsight>> {
        self.check_error().await?;
        self.call_count.lock().await.governance_policy += 1;
        Ok(self.policy.lock().await.clone())
    }

    async fn codify(&self, request: &CodifyRequest) -> Result<CodifyResponse> {
        self.call_count.lock().await.codify += 1;
        self.captured.lock().await.codify.push(request.clone());
        self.check_error().await?;

        if self.failing_codify.lock().await.contains(&request.asset_id) {
            return Err(ApiError::BadRequest(format!("cannot codify {}", request.asset_id)).into());
        }

        // Every generated resource is called "main" so files always need renaming
        Ok(CodifyResponse {
            codified_result: Some(format!(
                "resource \"{}\" \"main\" {{\n  id = \"{}\"\n}}\n",
                request.asset_type, request.asset_id
            )),
            import_blocks: Some(json!([format!(
                "import {{\n  to = {}.main\n  id = \"{}\"\n}}\n",
                request.asset_type, request.asset_id
            )])),
            import_command: Some(format!(
                "terraform import {}.main {}",
                request.asset_type, request.asset_id
            )),
            provider_block: Some(format!("provider \"{}\" {{}}\n", request.provider)),
        })
    }

    async fn create_workspace(&self, request: &CreateWorkspaceRequest) -> Result<Value> {
        let created = {
            let mut counts = self.call_count.lock().await;
            counts.create_workspace += 1;
            counts.create_workspace
        };
        self.captured.lock().await.workspaces.push(request.clone());
        self.check_error().await?;

        if self
            .failing_workspaces
            .lock()
            .await
            .contains(&request.workspace_name)
        {
            return Err(ApiError::BadRequest(format!(
                "workspace {} already exists",
                request.workspace_name
            ))
            .into());
        }
        Ok(json!({ "id": format!("ws-{}", created), "name": request.workspace_name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fixtures::AssetBuilder;

    #[tokio::test]
    async fn test_mock_filters_by_type_and_account() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::volume("vol-1").account("111").build(),
                AssetBuilder::volume("vol-2").account("222").build(),
                AssetBuilder::instance("i-1").account("111").build(),
            ])
            .await;

        let query = InventoryQuery::new()
            .asset_type("aws_ebs_volume")
            .provider_id("111");
        let page = mock.query(&query, None).await.unwrap();

        assert_eq!(page.response_objects.len(), 1);
        assert_eq!(page.response_objects[0].resource_id(), Some("vol-1"));
        assert_eq!(mock.call_counts().await.queries_for("aws_ebs_volume"), 1);
    }

    #[tokio::test]
    async fn test_mock_error_consumed_once() {
        let mock = MockInventoryClient::new()
            .with_error(ApiError::Unauthorized)
            .await;

        assert!(mock.query(&InventoryQuery::new(), None).await.is_err());
        assert!(mock.query(&InventoryQuery::new(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_codify_default_response() {
        let mock = MockInventoryClient::new();
        let request = CodifyRequest {
            asset_type: "aws_s3_bucket".into(),
            asset_id: "arn:aws:s3:::logs".into(),
            iac_type: "terraform".into(),
            provider: "aws".into(),
            account_number: "123".into(),
        };

        let response = mock.codify(&request).await.unwrap();
        assert!(response.codified_result.unwrap().contains("aws_s3_bucket"));
        assert_eq!(mock.captured().await.codify.len(), 1);
    }
}
