//! API trait definitions split by responsibility
//!
//! - [`AuthApi`] - key pair login
//! - [`InventoryApi`] - the paginated inventory endpoint
//! - [`PlatformApi`] - codify, integrations, governance and workspaces

mod auth;
mod inventory;
mod platform;

pub use auth::AuthApi;
pub use inventory::InventoryApi;
pub use platform::PlatformApi;
