//! Inventory query API trait

use async_trait::async_trait;

use crate::client::pagination::{Cursor, InventoryPage, InventoryQuery, MAX_PAGE_SIZE};
use crate::error::Result;

/// The single cursor-paginated inventory list endpoint.
///
/// Everything else the snapshot pipeline needs (volume, instance and
/// snapshot lookups) is built on top of this in
/// [`AssetLookup`](crate::client::lookup::AssetLookup).
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Fetch one page. `cursor` is the previous page's continuation token.
    async fn query(&self, query: &InventoryQuery, cursor: Option<&Cursor>)
    -> Result<InventoryPage>;

    /// Page size to request for list queries
    fn page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }
}
