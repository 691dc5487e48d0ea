//! Inventory API and GitHub clients

pub mod api;
#[cfg(test)]
pub mod fixtures;
pub mod github;
pub mod inventory;
pub mod lookup;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod pagination;
pub mod parallel;
pub mod rate_limit;
pub mod retry;

pub use github::GitHubClient;
pub use inventory::InventoryClient;
pub use retry::RetryPolicy;
