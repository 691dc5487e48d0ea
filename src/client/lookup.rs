//! Single and batched asset lookups built on the inventory query
//!
//! Lookups are provided for every [`InventoryApi`] implementation, so the
//! resolver works the same against the HTTP client and the test mock.

use std::collections::HashMap;

use async_trait::async_trait;

use super::api::InventoryApi;
use super::models::{ASSET_DB_INSTANCE, ASSET_EBS_VOLUME, ASSET_EC2_INSTANCE, RawAsset};
use super::pagination::{InventoryPager, InventoryQuery};
use crate::error::Result;

/// Most ids sent in one `$in` filter
const BATCH_ID_CHUNK: usize = 500;

/// Lookup partition: one provider account and optionally one region.
///
/// The account is sent to the server; the inventory endpoint has no region
/// filter, so callers apply `region` client-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    pub account_id: Option<String>,
    pub region: Option<String>,
}

impl Scope {
    pub fn new(account_id: Option<String>, region: Option<String>) -> Self {
        Self { account_id, region }
    }

    /// Base query for this scope
    pub fn query(&self, page_size: usize) -> InventoryQuery {
        let query = InventoryQuery::new().page_size(page_size);
        match &self.account_id {
            Some(account) => query.provider_id(account.clone()),
            None => query,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        format!(
            "account={} region={}",
            self.account_id.as_deref().unwrap_or("*"),
            self.region.as_deref().unwrap_or("*")
        )
    }
}

/// Resource lookups needed to resolve snapshot parents.
///
/// A record that does not exist is `Ok(None)` (or absent from a batch
/// map), never an error.
#[async_trait]
pub trait AssetLookup: Send + Sync {
    /// Find one EBS volume by id
    async fn get_volume(&self, volume_id: &str, scope: &Scope) -> Result<Option<RawAsset>>;

    /// Find many EBS volumes, keyed by `resourceId`
    async fn get_volumes_batch(
        &self,
        volume_ids: &[String],
        scope: &Scope,
    ) -> Result<HashMap<String, RawAsset>>;

    /// Every EC2 instance in scope
    async fn list_instances(&self, scope: &Scope) -> Result<Vec<RawAsset>>;

    /// Full EC2 instance record by `resourceId`
    async fn get_instance(&self, instance_id: &str, scope: &Scope) -> Result<Option<RawAsset>>;

    /// RDS instance by identifier
    async fn get_db_instance(&self, identifier: &str, scope: &Scope) -> Result<Option<RawAsset>>;
}

#[async_trait]
impl<T: InventoryApi + ?Sized> AssetLookup for T {
    async fn get_volume(&self, volume_id: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        let query = scope
            .query(self.page_size())
            .asset_type(ASSET_EBS_VOLUME)
            .resource_id(volume_id);
        exact_match(self, query, |r| r.resource_id() == Some(volume_id)).await
    }

    async fn get_volumes_batch(
        &self,
        volume_ids: &[String],
        scope: &Scope,
    ) -> Result<HashMap<String, RawAsset>> {
        let mut volumes = HashMap::new();
        for chunk in volume_ids.chunks(BATCH_ID_CHUNK) {
            let query = scope
                .query(self.page_size())
                .asset_type(ASSET_EBS_VOLUME)
                .resource_ids(chunk.iter().cloned());
            for volume in InventoryPager::new(self, query).collect_all().await? {
                if let Some(id) = volume.resource_id() {
                    volumes.insert(id.to_string(), volume);
                }
            }
        }
        log::debug!(
            "Batch volume lookup: {} requested, {} found ({})",
            volume_ids.len(),
            volumes.len(),
            scope.label()
        );
        Ok(volumes)
    }

    async fn list_instances(&self, scope: &Scope) -> Result<Vec<RawAsset>> {
        let query = scope.query(self.page_size()).asset_type(ASSET_EC2_INSTANCE);
        let instances = InventoryPager::new(self, query).collect_all().await?;
        log::debug!("Listed {} instances ({})", instances.len(), scope.label());
        Ok(instances)
    }

    async fn get_instance(&self, instance_id: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        let query = scope
            .query(self.page_size())
            .asset_type(ASSET_EC2_INSTANCE)
            .resource_id(instance_id);
        exact_match(self, query, |r| r.resource_id() == Some(instance_id)).await
    }

    async fn get_db_instance(&self, identifier: &str, scope: &Scope) -> Result<Option<RawAsset>> {
        let query = scope
            .query(self.page_size())
            .asset_type(ASSET_DB_INSTANCE)
            .names([identifier]);
        exact_match(self, query, |r| {
            r.str_field("name") == Some(identifier)
                || r.resource_id() == Some(identifier)
                || r.asset_id() == Some(identifier)
        })
        .await
    }
}

/// The record on the first page whose id matches exactly.
///
/// Near matches the server returns (a volume named after another volume's
/// id, say) are ignored, so single and batch lookups find the same record.
async fn exact_match<C, F>(
    client: &C,
    query: InventoryQuery,
    is_wanted: F,
) -> Result<Option<RawAsset>>
where
    C: InventoryApi + ?Sized,
    F: Fn(&RawAsset) -> bool + Send,
{
    let mut pager = InventoryPager::new(client, query);
    let Some(records) = pager.next_page().await? else {
        return Ok(None);
    };
    Ok(records.into_iter().find(|r| is_wanted(r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fixtures::AssetBuilder;
    use crate::client::mock::MockInventoryClient;

    #[test]
    fn test_scope_query_sets_account() {
        let scope = Scope::new(Some("123".into()), Some("us-east-1".into()));
        let query = scope.query(100);
        assert_eq!(query.provider_ids, vec!["123"]);
        assert_eq!(query.size, 100);
        assert_eq!(scope.label(), "account=123 region=us-east-1");

        assert!(Scope::default().query(100).provider_ids.is_empty());
    }

    #[tokio::test]
    async fn test_get_volume_found_and_missing() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![AssetBuilder::volume("vol-1").attached_to("i-1").build()])
            .await;

        let scope = Scope::default();
        let found = mock.get_volume("vol-1", &scope).await.unwrap();
        assert_eq!(found.unwrap().resource_id(), Some("vol-1"));
        assert!(mock.get_volume("vol-2", &scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_lookups_require_exact_id() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::volume("vol-restored").field("name", "vol-1").build(),
                AssetBuilder::db_instance("orders").build(),
            ])
            .await;

        let scope = Scope::default();
        assert!(mock.get_volume("vol-1", &scope).await.unwrap().is_none());
        assert!(mock.get_db_instance("order", &scope).await.unwrap().is_none());
        let db = mock.get_db_instance("orders", &scope).await.unwrap().unwrap();
        assert_eq!(db.resource_id(), Some("db-orders"));
    }

    #[tokio::test]
    async fn test_batch_lookup_keys_by_resource_id() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::volume("vol-1").build(),
                AssetBuilder::volume("vol-2").build(),
                AssetBuilder::instance("i-1").build(),
            ])
            .await;

        let ids = vec!["vol-1".to_string(), "vol-2".to_string(), "vol-9".to_string()];
        let volumes = mock.get_volumes_batch(&ids, &Scope::default()).await.unwrap();

        assert_eq!(volumes.len(), 2);
        assert!(volumes.contains_key("vol-1"));
        assert!(!volumes.contains_key("vol-9"));
        assert_eq!(mock.call_counts().await.query, 1);
    }

    #[tokio::test]
    async fn test_account_scope_filters_lookups() {
        let mock = MockInventoryClient::new()
            .with_assets(vec![
                AssetBuilder::instance("i-1").account("111").build(),
                AssetBuilder::instance("i-2").account("222").build(),
            ])
            .await;

        let scope = Scope::new(Some("111".into()), None);
        let instances = mock.list_instances(&scope).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert!(mock.get_instance("i-2", &scope).await.unwrap().is_none());
    }
}
