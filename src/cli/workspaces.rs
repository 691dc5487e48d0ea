//! Workspace mapping and creation commands

use colored::Colorize;
use dialoguer::Confirm;

use crate::cli::{CommandContext, CreateArgs, GlobalOptions, MapArgs};
use crate::client::GitHubClient;
use crate::error::{Error, Result};
use crate::output::{json, progress, table};
use crate::workspace::create::{self, WorkspaceOptions, env_variable};
use crate::workspace::mapping::{load_mapping, save_mapping};
use crate::workspace::source::map_targets;
use crate::workspace::{RepoMapping, RepoTarget};

pub async fn map(opts: &GlobalOptions, args: &MapArgs) -> Result<()> {
    let targets = args
        .targets
        .iter()
        .map(|t| RepoTarget::parse(t))
        .collect::<Result<Vec<_>>>()?;

    if args.github_token.as_deref().is_none_or(str::is_empty) {
        log::warn!(
            "No GitHub token; unauthenticated requests are limited to 60 per hour and private repositories are invisible"
        );
    }
    let config = opts.load_config()?;
    let github = GitHubClient::new(
        &args.github_api_url,
        args.github_token.as_deref(),
        config.retry_policy,
    )?;

    let spinner = progress::spinner(format!("Mapping {} targets", targets.len()));
    let mapping = map_targets(&github, &targets).await;
    spinner.finish_and_clear();

    for (repo, entry) in &mapping {
        match entry {
            RepoMapping::Tree(tree) => {
                println!("{} {} ({} directories)", "✓".green(), repo, tree.count())
            }
            RepoMapping::Failed { error } => println!("{} {}: {}", "✗".red(), repo, error),
        }
    }

    save_mapping(&args.out, &mapping)?;
    println!("Mapping saved to {}", args.out.display());
    Ok(())
}

/// Shared workspace settings from the command line
pub fn workspace_options(args: &CreateArgs) -> WorkspaceOptions {
    let triggers = if args.triggers.is_empty() {
        vec!["merge".to_string()]
    } else {
        args.triggers.clone()
    };
    WorkspaceOptions {
        vcs_id: args.vcs_id.clone(),
        vcs_type: args.vcs_type.clone(),
        branch: args.branch.clone(),
        runner_type: args.runner_type.clone(),
        iac_type: args.iac_type.clone(),
        terraform_version: args.terraform_version.clone(),
        triggers,
        apply_rule: args.apply_rule.clone(),
        project: args.project.clone(),
        variable_sets: args.variable_sets.clone(),
        variables: args
            .vars
            .iter()
            .map(|(k, v)| env_variable(k.clone(), v.clone()))
            .collect(),
    }
}

pub async fn create(opts: &GlobalOptions, args: &CreateArgs) -> Result<()> {
    let mapping = load_mapping(&args.mapping)?;
    let planned = create::plan(&mapping);
    if planned.is_empty() {
        println!("No leaf directories in {}", args.mapping.display());
        return Ok(());
    }

    println!("{}", table::format_table(&planned));
    if args.dry_run {
        println!(
            "Dry run: {} workspaces would be created from {} repositories",
            planned.len(),
            mapping.len()
        );
        return Ok(());
    }

    if !args.yes {
        eprintln!(
            "{} Create {} workspaces on VCS integration {}?",
            "⚠".yellow(),
            planned.len(),
            args.vcs_id
        );
        let confirm = Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()?;

        if !confirm {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    let ctx = CommandContext::new(opts).await?;
    let options = workspace_options(args);
    let results = create::create_all(&*ctx.client, &planned, &options, mapping.len()).await;

    json::write_json_file(&args.results, &results)?;
    println!(
        "{}",
        table::format_summary(&[
            ("Repositories", results.total_repos),
            ("Workspaces created", results.total_workflows_created),
            ("Workspaces failed", results.total_workflows_failed),
        ])
    );
    println!("Results saved to {}", args.results.display());

    if results.total_workflows_failed > 0 {
        return Err(Error::Other(format!(
            "{} of {} workspaces failed",
            results.total_workflows_failed,
            planned.len()
        )));
    }
    Ok(())
}
