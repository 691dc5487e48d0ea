//! Per-endpoint request pacing for the Inventory API
//!
//! Write endpoints that are called once per item in a bulk run (codify,
//! workspace creation) are paced proactively. Everything else relies on
//! the retry policy reacting to 429 responses.

use std::collections::HashMap;
use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Categories of API endpoints with their pacing.
///
/// - Codify: 50 req/sec (one request every 20ms)
/// - Workspace creation: 10 req/sec
/// - All other endpoints: unpaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// POST /api/v1.0/codify
    Codify,
    /// POST /v2/runners/workspaces
    Workspace,
    /// Everything else
    Default,
}

impl EndpointCategory {
    /// Categories that carry a limiter
    pub const PACED: [EndpointCategory; 2] = [EndpointCategory::Codify, EndpointCategory::Workspace];

    /// Categorize a request based on path and method.
    ///
    /// The path is the API path without the base URL (e.g., "/api/v1.0/codify").
    pub fn from_request(path: &str, method: &reqwest::Method) -> Self {
        if *method != reqwest::Method::POST {
            return EndpointCategory::Default;
        }
        if path.ends_with("/codify") {
            return EndpointCategory::Codify;
        }
        if path.ends_with("/runners/workspaces") {
            return EndpointCategory::Workspace;
        }
        EndpointCategory::Default
    }

    /// Requests per second for this category, `None` when unpaced.
    pub fn rate_limit(&self) -> Option<u32> {
        match self {
            EndpointCategory::Codify => Some(50),
            EndpointCategory::Workspace => Some(10),
            EndpointCategory::Default => None,
        }
    }
}

/// Pacing limiter for one endpoint category.
pub struct EndpointRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    category: EndpointCategory,
}

impl EndpointRateLimiter {
    /// Create a limiter for a paced category; `None` for unpaced ones.
    pub fn new(category: EndpointCategory) -> Option<Self> {
        let rate = NonZeroU32::new(category.rate_limit()?)?;
        // Burst of one keeps requests evenly spaced
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Some(Self {
            limiter: RateLimiter::direct(quota),
            category,
        })
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        if self.limiter.check().is_err() {
            debug!("Pacing {:?} request", self.category);
            self.limiter.until_ready().await;
        }
    }
}

/// Limiters for every paced endpoint category.
pub struct RateLimiterSet {
    limiters: HashMap<EndpointCategory, EndpointRateLimiter>,
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        let limiters = EndpointCategory::PACED
            .into_iter()
            .filter_map(|category| EndpointRateLimiter::new(category).map(|l| (category, l)))
            .collect();
        Self { limiters }
    }

    /// Wait for permission to send a request of this category.
    pub async fn wait_for(&self, category: EndpointCategory) {
        if let Some(limiter) = self.limiters.get(&category) {
            limiter.wait().await;
        }
    }
}
