//! Inventory query building and cursor pagination
//!
//! The inventory endpoint pages with an opaque `afterKey` cursor. A page
//! sequence is consumed through [`InventoryPager`], which only moves
//! forward and cannot be restarted.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::api::InventoryApi;
use super::models::RawAsset;
use crate::error::Result;

/// Maximum page size supported by the inventory endpoint.
/// Using this as default minimizes API calls.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Opaque continuation token returned by the list endpoint
pub type Cursor = Value;

/// Provider type filter, serialized as `{"provider": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderTypes {
    pub provider: Vec<String>,
}

/// Inventory query filters.
///
/// Use the builder methods to configure; empty filters are left out of
/// the request body.
///
/// # Example
/// ```ignore
/// let query = InventoryQuery::new()
///     .asset_type("aws_ebs_volume")
///     .provider_id("123456789012")
///     .names(["vol-1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub asset_types: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provider_ids: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_types: Option<ProviderTypes>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_state: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arns: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_groups: Vec<String>,

    /// Only assets created within this many days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_range_epoch: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<String>,

    pub size: usize,
}

impl Default for InventoryQuery {
    fn default() -> Self {
        Self {
            asset_types: Vec::new(),
            provider_ids: Vec::new(),
            provider_types: None,
            asset_state: None,
            names: Vec::new(),
            arns: Vec::new(),
            resource_groups: Vec::new(),
            day_range_epoch: None,
            filters: None,
            governance: None,
            size: MAX_PAGE_SIZE,
        }
    }
}

impl InventoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_types.push(asset_type.into());
        self
    }

    pub fn asset_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_ids.push(id.into());
        self
    }

    pub fn provider_type(mut self, provider: impl Into<String>) -> Self {
        self.provider_types
            .get_or_insert_with(|| ProviderTypes { provider: Vec::new() })
            .provider
            .push(provider.into());
        self
    }

    pub fn asset_state(mut self, state: impl Into<String>) -> Self {
        self.asset_state = Some(state.into());
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn arns<I, S>(mut self, arns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arns.extend(arns.into_iter().map(Into::into));
        self
    }

    pub fn resource_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Only assets created in the last `days` days
    pub fn created_within_days(mut self, days: u32) -> Self {
        self.day_range_epoch = Some(days);
        self
    }

    /// Exact match on `resourceId`
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.filters = Some(json!({ "resourceId": id.into() }));
        self
    }

    /// Match any of the given `resourceId`s
    pub fn resource_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        self.filters = Some(json!({ "resourceId": { "$in": ids } }));
        self
    }

    pub fn governance(mut self, policy_name: impl Into<String>) -> Self {
        self.governance = Some(policy_name.into());
        self
    }

    /// Set the page size, clamped to `1..=MAX_PAGE_SIZE`
    pub fn page_size(mut self, size: usize) -> Self {
        self.size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Request body for one page
    pub fn to_body(&self, cursor: Option<&Cursor>) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        if let (Some(cursor), Some(map)) = (cursor, body.as_object_mut()) {
            map.insert("afterKey".to_string(), cursor.clone());
        }
        Ok(body)
    }
}

/// One page of inventory results
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPage {
    #[serde(default)]
    pub response_objects: Vec<RawAsset>,

    #[serde(default)]
    pub after_key: Option<Cursor>,
}

impl InventoryPage {
    /// Continuation cursor, treating `null` and empty values as absent
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.after_key.as_ref().filter(|key| match key {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        })
    }
}

/// Forward-only walk over the pages of one query.
///
/// Starts with no cursor and stops for good once the server returns no
/// cursor, an empty page, or fewer records than the page size.
pub struct InventoryPager<'a, C: InventoryApi + ?Sized> {
    client: &'a C,
    query: InventoryQuery,
    cursor: Option<Cursor>,
    finished: bool,
    pages_fetched: usize,
}

impl<'a, C: InventoryApi + ?Sized> InventoryPager<'a, C> {
    pub fn new(client: &'a C, query: InventoryQuery) -> Self {
        Self {
            client,
            query,
            cursor: None,
            finished: false,
            pages_fetched: 0,
        }
    }

    /// Fetch the next page; `Ok(None)` once the sequence is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawAsset>>> {
        if self.finished {
            return Ok(None);
        }

        let page = match self.client.query(&self.query, self.cursor.as_ref()).await {
            Ok(page) => page,
            Err(err) => {
                // The server-side cursor state is unknown after a failure
                self.finished = true;
                return Err(err);
            }
        };
        self.pages_fetched += 1;

        let count = page.response_objects.len();
        match page.next_cursor() {
            Some(next) if count > 0 && count >= self.query.size => {
                self.cursor = Some(next.clone());
            }
            _ => self.finished = true,
        }

        log::debug!(
            "Inventory page {} returned {} records{}",
            self.pages_fetched,
            count,
            if self.finished { " (last)" } else { "" }
        );

        if count == 0 {
            return Ok(None);
        }
        Ok(Some(page.response_objects))
    }

    /// Drain every remaining page.
    pub async fn collect_all(mut self) -> Result<Vec<RawAsset>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }
        Ok(records)
    }
}
