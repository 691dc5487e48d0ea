//! Platform API trait (codify, integrations, governance, workspaces)

use async_trait::async_trait;
use serde_json::Value;

use crate::client::models::{
    CodifyRequest, CodifyResponse, CreateWorkspaceRequest, GovernanceInsight, Integration,
};
use crate::error::Result;

/// Non-inventory platform operations
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// List cloud integrations for a provider type (`aws`, `azurerm`)
    async fn list_integrations(&self, provider: &str) -> Result<Vec<Integration>>;

    /// Look up a governance policy by id
    async fn governance_policy(&self, policy_id: &str) -> Result<Option<GovernanceInsight>>;

    /// Generate configuration for one asset
    async fn codify(&self, request: &CodifyRequest) -> Result<CodifyResponse>;

    /// Register a workspace; returns the created object
    async fn create_workspace(&self, request: &CreateWorkspaceRequest) -> Result<Value>;
}
