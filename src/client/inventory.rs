//! Inventory API client implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::api::{AuthApi, InventoryApi, PlatformApi};
use super::models::{
    AccessToken, CodifyRequest, CodifyResponse, CreateWorkspaceRequest, GovernanceInsight,
    InsightsResponse, Integration,
};
use super::pagination::{Cursor, InventoryPage, InventoryQuery};
use super::rate_limit::{EndpointCategory, RateLimiterSet};
use super::retry::RetryPolicy;
use crate::config::Config;
use crate::error::{ApiError, Result};

/// Longest error body echoed into an error message
const MAX_ERROR_BODY: usize = 300;

/// Inventory API client.
///
/// Holds the bearer token obtained at login. The token is never refreshed
/// or replaced, so one client can be shared across tasks behind an `Arc`.
pub struct InventoryClient {
    http: HttpClient,
    base_url: String,
    retry: RetryPolicy,
    page_size: usize,
    token: Option<AccessToken>,
    limiters: RateLimiterSet,
}

impl InventoryClient {
    /// Create an unauthenticated client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("invkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base().to_string(),
            retry: config.retry_policy,
            page_size: config.page_size,
            token: None,
            limiters: RateLimiterSet::new(),
        })
    }

    /// Attach a token obtained from [`AuthApi::authenticate`]
    pub fn with_token(mut self, token: AccessToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Validate credentials, log in once, and return the authenticated client.
    pub async fn login(config: &Config) -> Result<Self> {
        let (access_key, secret_key) = config.validate_auth()?;
        let client = Self::new(config)?;
        let token = client.authenticate(access_key, secret_key).await?;
        log::info!("Authenticated against {}", client.base_url);
        Ok(client.with_token(token))
    }

    fn bearer(&self) -> std::result::Result<&str, ApiError> {
        self.token
            .as_ref()
            .map(AccessToken::as_str)
            .ok_or_else(|| ApiError::Auth("client has not logged in".to_string()))
    }

    /// Send an authenticated request, retrying transient failures
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let token = self.bearer()?;
        let url = format!("{}{}", self.base_url, path);
        let label = format!("{} {}", method, path);
        self.limiters
            .wait_for(EndpointCategory::from_request(path, &method))
            .await;
        let (url, method) = (&url, &method);

        let data = self
            .retry
            .run(&label, || async move {
                let mut request = self
                    .http
                    .request(method.clone(), url.as_str())
                    .bearer_auth(token);
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request.send().await.map_err(ApiError::from)?;
                read_response::<T>(response).await
            })
            .await?;
        Ok(data)
    }
}

/// Map an HTTP response to its decoded body or an [`ApiError`]
pub(crate) async fn read_response<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to read response: {}", e)))?;
        return serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
        });
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(
            error_body(response, "Resource not found").await,
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            Err(ApiError::RateLimit(Duration::from_secs(retry_after)))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Err(ApiError::Unavailable(status.as_u16()))
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(ApiError::BadRequest(error_body(response, "Bad request").await))
        }
        status if status.is_server_error() => {
            let fallback = format!("HTTP {}", status);
            Err(ApiError::ServerError(error_body(response, &fallback).await))
        }
        _ => Err(ApiError::InvalidResponse(format!(
            "Unexpected status code: {}",
            status
        ))),
    }
}

async fn error_body(response: Response, fallback: &str) -> String {
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => truncate(text.trim(), MAX_ERROR_BODY),
        _ => fallback.to_string(),
    }
}

/// Shorten to at most `max` characters, marking the cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}

#[async_trait]
impl AuthApi for InventoryClient {
    async fn authenticate(&self, access_key: &str, secret_key: &str) -> Result<AccessToken> {
        let url = format!("{}/api/v1.0/login", self.base_url);
        let body = json!({ "accessKey": access_key, "secretKey": secret_key });
        let (url, body) = (&url, &body);

        let value: Value = self
            .retry
            .run("POST /api/v1.0/login", || async move {
                let response = self
                    .http
                    .post(url.as_str())
                    .json(body)
                    .send()
                    .await
                    .map_err(ApiError::from)?;
                read_response::<Value>(response).await
            })
            .await
            .map_err(|err| match err {
                e @ (ApiError::Connection(_) | ApiError::Network(_)) => e,
                ApiError::Unauthorized | ApiError::Forbidden => {
                    ApiError::Auth("invalid access key or secret key".to_string())
                }
                other => ApiError::Auth(other.to_string()),
            })?;

        let token = value
            .get("accessToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Auth("login response did not include an access token".to_string())
            })?;

        Ok(AccessToken {
            access_token: token.to_string(),
            expires_after: value.get("expiresAfter").and_then(Value::as_u64),
        })
    }
}

#[async_trait]
impl InventoryApi for InventoryClient {
    async fn query(
        &self,
        query: &InventoryQuery,
        cursor: Option<&Cursor>,
    ) -> Result<InventoryPage> {
        let body = query.to_body(cursor)?;
        self.send(Method::POST, "/api/v1.0/inventory", Some(&body))
            .await
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

#[async_trait]
impl PlatformApi for InventoryClient {
    async fn list_integrations(&self, provider: &str) -> Result<Vec<Integration>> {
        let path = format!("/api/v1.0/integrations/{}", provider);
        self.send(Method::GET, &path, None).await
    }

    async fn governance_policy(&self, policy_id: &str) -> Result<Option<GovernanceInsight>> {
        let body = json!({ "id": [policy_id], "onlyMatchingAssets": true });
        let response: InsightsResponse = self
            .send(Method::POST, "/v2/governance/insights", Some(&body))
            .await?;
        Ok(response.into_first())
    }

    async fn codify(&self, request: &CodifyRequest) -> Result<CodifyResponse> {
        let body = serde_json::to_value(request)?;
        self.send(Method::POST, "/api/v1.0/codify", Some(&body))
            .await
    }

    async fn create_workspace(&self, request: &CreateWorkspaceRequest) -> Result<Value> {
        let body = serde_json::to_value(request)?;
        self.send(Method::POST, "/v2/runners/workspaces", Some(&body))
            .await
    }
}
