//! Authentication API trait

use async_trait::async_trait;

use crate::client::models::AccessToken;
use crate::error::Result;

/// Authentication operations for the Inventory API
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange an access key and secret key for a bearer token.
    ///
    /// Fails with `ApiError::Auth` on a non-2xx response or a response
    /// without a token.
    async fn authenticate(&self, access_key: &str, secret_key: &str) -> Result<AccessToken>;
}
