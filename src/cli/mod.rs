//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
pub use clap_complete::Shell;

use crate::client::github::DEFAULT_GITHUB_API_URL;
use crate::codify::Provider;
use crate::codify::select::parse_key_value;

pub mod args;
pub mod codify;
pub mod context;
pub mod list;
pub mod prices;
pub mod snapshots;
pub mod workspaces;

pub use args::{GlobalOptions, OutputFormat, ReportFormat};
pub use context::CommandContext;

/// invkit - command-line tools for the cloud asset Inventory API
#[derive(Parser, Debug)]
#[command(name = "invkit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Inventory API base URL
    #[arg(long, global = true, env = "INVENTORY_API_URL", hide_env = true)]
    pub api_url: Option<String>,

    /// Inventory API access key
    #[arg(long, global = true, env = "INVENTORY_ACCESS_KEY", hide_env = true)]
    pub access_key: Option<String>,

    /// Inventory API secret key
    #[arg(
        long,
        global = true,
        env = "INVENTORY_SECRET_KEY",
        hide_env = true,
        hide_env_values = true
    )]
    pub secret_key: Option<String>,

    /// Override config file location
    #[arg(long, global = true, env = "INVKIT_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "INVKIT_VERBOSE", hide_env = true)]
    pub verbose: bool,
}

impl Cli {
    /// Log to stderr at `info`, or `debug` with `--verbose`; `RUST_LOG` wins
    pub fn init_logging(&self) {
        let level = if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_secs()
            .init();
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Correlate snapshots to their parent resources and export a cost report
    Snapshots(SnapshotsArgs),

    /// List the resources a governance policy flags
    List(ListArgs),

    /// Generate Terraform for inventory assets
    Codify(CodifyArgs),

    /// Map repositories and register per-directory workspaces
    #[command(subcommand)]
    Workspaces(WorkspacesCommands),

    /// Show the snapshot price table
    Prices {
        /// JSON price table to use instead of the bundled one
        #[arg(long)]
        pricing_file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   invkit completion bash > /etc/bash_completion.d/invkit
  zsh:    invkit completion zsh > \"${fpath[1]}/_invkit\"
  fish:   invkit completion fish > ~/.config/fish/completions/invkit.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Snapshot report options
#[derive(Debug, Clone, Args)]
pub struct SnapshotsArgs {
    /// Only scan these accounts (repeatable)
    #[arg(long = "account-id", value_name = "ID")]
    pub account_ids: Vec<String>,

    /// Only keep snapshots in these regions (repeatable)
    #[arg(long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Only snapshots created within the last N days
    #[arg(long, value_name = "N")]
    pub since_days: Option<u32>,

    /// Report path [default: reports/snapshot-report-YYYYMMDD-HHMMSS.csv]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Only snapshots without a parent resource
    #[arg(long, conflicts_with = "parent_only")]
    pub orphaned_only: bool,

    /// Only snapshots with a parent resource
    #[arg(long)]
    pub parent_only: bool,

    /// Report files to write
    #[arg(long, value_enum, default_value = "csv")]
    pub format: ReportFormat,

    /// Leave the cost columns out
    #[arg(long)]
    pub no_costs: bool,

    /// JSON price table to use instead of the bundled one
    #[arg(long, conflicts_with = "no_costs")]
    pub pricing_file: Option<PathBuf>,

    /// Resolve each EBS snapshot's parent with its own lookups
    #[arg(long)]
    pub individual: bool,

    /// Partitions collected at once [default: from config, 8]
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Governance listing options
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Governance policy id
    #[arg(long)]
    pub policy_id: String,

    /// Asset states to query (repeatable) [default: managed, unmanaged, ghost, modified]
    #[arg(long = "state", value_name = "STATE")]
    pub states: Vec<String>,

    /// File the ARNs are written to, one per line
    #[arg(long, default_value = "asset_arns.txt")]
    pub out: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Bulk codify options
#[derive(Debug, Clone, Args)]
pub struct CodifyArgs {
    /// Cloud provider
    #[arg(long, value_enum)]
    pub provider: Provider,

    /// Account number (AWS account id or Azure subscription id)
    #[arg(long, conflicts_with = "data_source", required_unless_present = "data_source")]
    pub account_number: Option<String>,

    /// Integration name to look the account number up by
    #[arg(long)]
    pub data_source: Option<String>,

    /// Asset types to include (repeatable)
    #[arg(long = "asset-type", value_name = "TYPE")]
    pub asset_types: Vec<String>,

    /// Asset names to include (repeatable)
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// ARNs to include (repeatable)
    #[arg(long = "arn", value_name = "ARN")]
    pub arns: Vec<String>,

    /// Only assets created within the last N days
    #[arg(long, value_name = "N")]
    pub since_days: Option<u32>,

    /// Azure resource groups to include (repeatable)
    #[arg(long = "resource-group", value_name = "NAME")]
    pub resource_groups: Vec<String>,

    /// Keep assets carrying any of these tags (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub tags: Vec<(String, String)>,

    /// Inventory asset state
    #[arg(long, default_value = "unmanaged")]
    pub asset_state: String,

    /// Codify at most this many assets
    #[arg(long, value_name = "N")]
    pub max_resources: Option<usize>,

    /// Directory the Terraform files are written to
    #[arg(long, default_value = "codify-output")]
    pub out_dir: PathBuf,

    /// Keep comments from the generated code
    #[arg(long)]
    pub keep_comments: bool,
}

/// Workspace subcommands
#[derive(Subcommand, Debug)]
pub enum WorkspacesCommands {
    /// Save the directory tree of repositories to a mapping file
    Map(MapArgs),

    /// Register a workspace for every leaf directory of a mapping file
    Create(CreateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    /// Repositories or organizations: owner/repo, org, or a GitHub URL
    #[arg(required = true, value_name = "TARGET")]
    pub targets: Vec<String>,

    /// GitHub token for private repositories and higher rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    /// Mapping file to write
    #[arg(long, default_value = "github_directory_mapping.json")]
    pub out: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Mapping file written by `workspaces map`
    #[arg(long, default_value = "github_directory_mapping.json")]
    pub mapping: PathBuf,

    /// VCS integration id
    #[arg(long)]
    pub vcs_id: String,

    /// VCS type (github, gitlab, bitbucket, codecommit, azuredevops)
    #[arg(long, default_value = "github")]
    pub vcs_type: String,

    /// Branch the workspaces track
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Runner type
    #[arg(long, default_value = "firefly")]
    pub runner_type: String,

    /// IaC type
    #[arg(long, default_value = "terraform")]
    pub iac_type: String,

    /// Terraform version
    #[arg(long, default_value = "1.5.7")]
    pub terraform_version: String,

    /// Execution triggers (repeatable) [default: merge]
    #[arg(long = "trigger", value_name = "TRIGGER")]
    pub triggers: Vec<String>,

    /// Apply rule (manual, auto)
    #[arg(long, default_value = "manual")]
    pub apply_rule: String,

    /// Project id; workspaces are global without one
    #[arg(long)]
    pub project: Option<String>,

    /// Variable set ids the workspaces consume (repeatable)
    #[arg(long = "variable-set", value_name = "ID")]
    pub variable_sets: Vec<String>,

    /// Environment variables for every workspace (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Results log to write
    #[arg(long, default_value = "workspaces_created.json")]
    pub results: PathBuf,

    /// Show the workspaces that would be created and stop
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_snapshot_filters_conflict() {
        let err = Cli::try_parse_from(["invkit", "snapshots", "--orphaned-only", "--parent-only"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_codify_requires_an_account() {
        assert!(Cli::try_parse_from(["invkit", "codify", "--provider", "aws"]).is_err());

        let cli = Cli::try_parse_from([
            "invkit",
            "codify",
            "--provider",
            "azure",
            "--data-source",
            "prod",
            "--tag",
            "env=prod",
        ])
        .unwrap();
        match cli.command {
            Commands::Codify(args) => {
                assert_eq!(args.provider, Provider::Azure);
                assert_eq!(args.asset_state, "unmanaged");
                assert_eq!(args.tags, vec![("env".to_string(), "prod".to_string())]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "invkit",
            "list",
            "--policy-id",
            "p1",
            "--api-url",
            "http://localhost:9",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9"));
        assert!(cli.verbose);
    }
}
