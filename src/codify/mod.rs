//! Bulk codify: inventory assets to Terraform files
//!
//! A run resolves the target account, lists candidate assets, turns them
//! into codify requests and calls the codify endpoint once per request.
//! Successful responses are handed to [`writer::CodifyWriter`].

pub mod format;
pub mod select;
pub mod writer;

use std::time::{Duration, Instant};

use clap::ValueEnum;
use colored::Colorize;

use crate::client::api::{InventoryApi, PlatformApi};
use crate::client::inventory::truncate;
use crate::client::models::{CodifyRequest, CodifyResponse};
use crate::client::pagination::InventoryPager;
use crate::error::{ApiError, Result};

use select::CodifyFilters;

/// Progress line cadence
const PROGRESS_EVERY: usize = 25;

/// Longest error message echoed per item
const MAX_ITEM_ERROR: usize = 300;

/// Cloud provider a codify run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Aws,
    Azure,
}

impl Provider {
    /// Provider name the API uses
    pub fn api_name(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azurerm",
        }
    }
}

/// Account number of the integration named `data_source`
pub async fn resolve_account<C>(client: &C, provider: Provider, data_source: &str) -> Result<String>
where
    C: PlatformApi + ?Sized,
{
    let integrations = client.list_integrations(provider.api_name()).await?;
    log::debug!(
        "{} {} integrations",
        integrations.len(),
        provider.api_name()
    );

    let wanted = data_source.trim().to_lowercase();
    let integration = integrations
        .iter()
        .find(|i| i.name.trim().to_lowercase() == wanted)
        .ok_or_else(|| ApiError::NotFound(format!("data source '{}'", data_source)))?;

    integration.account().map(str::to_string).ok_or_else(|| {
        ApiError::InvalidResponse(format!("data source '{}' has no account number", data_source))
            .into()
    })
}

/// Codify requests for one account: matching assets, then the Azure
/// resource groups themselves when any were named.
pub async fn plan<C>(
    client: &C,
    provider: Provider,
    account: &str,
    filters: &CodifyFilters,
) -> Result<Vec<CodifyRequest>>
where
    C: InventoryApi + ?Sized,
{
    let query = select::inventory_query(provider, account, filters, client.page_size());
    let assets = InventoryPager::new(client, query).collect_all().await?;
    log::info!("Inventory returned {} candidate assets", assets.len());

    let mut requests = select::select(&assets, provider, account, filters);
    if provider == Provider::Azure && !filters.resource_groups.is_empty() {
        requests.extend(select::resource_group_requests(
            account,
            &filters.resource_groups,
        ));
    }
    Ok(requests)
}

/// Outcome of [`codify_all`]
#[derive(Debug, Default)]
pub struct CodifyRun {
    pub results: Vec<(CodifyRequest, CodifyResponse)>,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl CodifyRun {
    pub fn total(&self) -> usize {
        self.ok + self.failed + self.skipped
    }
}

/// Call the codify endpoint for each request in order.
///
/// Requests with empty required fields are skipped without a call. A
/// failed call is reported on its line and the run continues.
pub async fn codify_all<C>(client: &C, requests: Vec<CodifyRequest>) -> CodifyRun
where
    C: PlatformApi + ?Sized,
{
    let total = requests.len();
    let started = Instant::now();
    let mut run = CodifyRun::default();

    for (i, request) in requests.into_iter().enumerate() {
        let idx = i + 1;
        println!(
            "[{}/{}] {} → {}",
            idx,
            total,
            request.asset_type,
            request.asset_id
        );

        let missing = request.missing_fields();
        if !missing.is_empty() {
            println!("  {} skip (missing {:?})", "⨯".yellow(), missing);
            run.skipped += 1;
        } else {
            let call_started = Instant::now();
            match client.codify(&request).await {
                Ok(response) => {
                    println!(
                        "  {} ok ({:.2}s)",
                        "✓".green(),
                        call_started.elapsed().as_secs_f64()
                    );
                    run.ok += 1;
                    run.results.push((request, response));
                }
                Err(e) => {
                    println!(
                        "  {} failed: {}",
                        "⨯".red(),
                        truncate(&e.to_string(), MAX_ITEM_ERROR)
                    );
                    log::debug!("codify {} failed: {:?}", request.asset_id, e);
                    run.failed += 1;
                }
            }
        }

        if idx % PROGRESS_EVERY == 0 || idx == total {
            println!(
                "{}",
                progress_line(idx, total, run.ok, run.failed, started.elapsed()).dimmed()
            );
        }
    }

    run.elapsed = started.elapsed();
    println!(
        "Done codifying: ok={}, fail={}, total={}, elapsed={:.1}s",
        run.ok,
        run.failed,
        total,
        run.elapsed.as_secs_f64()
    );
    run
}

/// `progress: idx/total | ok= fail= | rate/s | ETA ~Ns`
fn progress_line(idx: usize, total: usize, ok: usize, failed: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { idx as f64 / secs } else { 0.0 };
    let remaining = total.saturating_sub(idx);
    let eta = if rate > 0.0 {
        (remaining as f64 / rate).round() as u64
    } else {
        0
    };
    format!(
        "progress: {}/{} | ok={} fail={} | {:.1}/s | ETA ~{}s",
        idx, total, ok, failed, rate, eta
    )
}
