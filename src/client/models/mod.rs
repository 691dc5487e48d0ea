//! Inventory API data models
//!
//! Inventory records stay raw JSON ([`RawAsset`]); the smaller platform
//! endpoints get typed request and response structs.

mod asset;
mod auth;
mod platform;

pub use asset::{
    ASSET_DB_INSTANCE, ASSET_DB_SNAPSHOT, ASSET_EBS_SNAPSHOT, ASSET_EBS_VOLUME,
    ASSET_EC2_INSTANCE, RawAsset, non_empty_str, value_as_f64,
};
pub use auth::AccessToken;
pub use platform::{
    CodifyRequest, CodifyResponse, CreateWorkspaceRequest, GovernanceInsight, InsightsResponse,
    Integration, WorkspaceExecution, WorkspaceVariable,
};
