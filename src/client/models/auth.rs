//! Authentication models

use serde::{Deserialize, Serialize};

/// Bearer token issued by the login endpoint.
///
/// Created once per run and never mutated, so it can be shared by every
/// concurrent request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,

    /// Lifetime in seconds, when the server reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<u64>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            expires_after: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.access_token
    }
}
