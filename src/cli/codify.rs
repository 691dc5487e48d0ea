//! Bulk codify command

use colored::Colorize;

use crate::cli::{CodifyArgs, CommandContext, GlobalOptions};
use crate::codify::select::CodifyFilters;
use crate::codify::writer::CodifyWriter;
use crate::codify::{self, Provider};
use crate::error::{Error, Result};
use crate::output::table;

fn step(n: usize, message: &str) {
    println!("{} {}", format!("[{}/6]", n).cyan().bold(), message);
}

/// Inventory filters from the command line
pub fn filters(args: &CodifyArgs) -> CodifyFilters {
    CodifyFilters {
        asset_types: args.asset_types.clone(),
        names: args.names.clone(),
        arns: args.arns.clone(),
        since_days: args.since_days,
        asset_state: Some(args.asset_state.clone()).filter(|s| !s.trim().is_empty()),
        resource_groups: args.resource_groups.clone(),
        tags: args.tags.clone(),
        max_resources: args.max_resources,
    }
}

pub async fn run(opts: &GlobalOptions, args: &CodifyArgs) -> Result<()> {
    if args.provider == Provider::Aws && !args.resource_groups.is_empty() {
        log::warn!("--resource-group only applies to Azure; ignoring it");
    }

    step(1, "Authenticating");
    let ctx = CommandContext::new(opts).await?;

    step(2, "Resolving account");
    let account = match (&args.account_number, &args.data_source) {
        (Some(account), _) => account.clone(),
        (None, Some(source)) => {
            let account = codify::resolve_account(&*ctx.client, args.provider, source).await?;
            println!("  data source '{}' → account {}", source, account);
            account
        }
        (None, None) => {
            return Err(Error::Other(
                "pass --account-number or --data-source".to_string(),
            ));
        }
    };

    step(3, "Listing inventory");
    let requests = codify::plan(&*ctx.client, args.provider, &account, &filters(args)).await?;
    println!("  {} assets selected", requests.len());
    if requests.is_empty() {
        println!("Nothing to codify.");
        return Ok(());
    }

    step(4, &format!("Codifying {} assets", requests.len()));
    let run = codify::codify_all(&*ctx.client, requests).await;

    step(5, &format!("Writing files to {}", args.out_dir.display()));
    let mut writer = CodifyWriter::new(args.provider, args.keep_comments);
    for (request, response) in &run.results {
        writer.add(request, response);
    }
    let written = writer.finish(&args.out_dir)?;

    step(6, "Summary");
    let rows = [
        ("Codified", run.ok.to_string()),
        ("Failed", run.failed.to_string()),
        ("Skipped", run.skipped.to_string()),
        ("Terraform files", written.tf_files.len().to_string()),
        ("Renamed resources", written.renamed.to_string()),
        ("Import commands", written.import_commands.to_string()),
        (
            "Provider file",
            written
                .provider_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Elapsed", format!("{:.1}s", run.elapsed.as_secs_f64())),
    ];
    println!("{}", table::format_summary(&rows));
    Ok(())
}
