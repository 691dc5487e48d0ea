//! Workspace registration from a directory mapping

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use super::mapping::{Mapping, RepoMapping};
use crate::client::api::PlatformApi;
use crate::client::models::{CreateWorkspaceRequest, WorkspaceExecution, WorkspaceVariable};
use crate::error::Error;

/// Settings shared by every workspace of a run
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    pub vcs_id: String,
    pub vcs_type: String,
    pub branch: String,
    pub runner_type: String,
    pub iac_type: String,
    pub terraform_version: String,
    pub triggers: Vec<String>,
    pub apply_rule: String,
    pub project: Option<String>,
    pub variable_sets: Vec<String>,
    pub variables: Vec<WorkspaceVariable>,
}

/// An environment variable passed to every workspace
pub fn env_variable(key: String, value: String) -> WorkspaceVariable {
    WorkspaceVariable {
        key,
        value,
        sensitivity: "string".to_string(),
        destination: "env".to_string(),
    }
}

/// One workspace to register
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct PlannedWorkspace {
    #[tabled(rename = "REPO")]
    pub repo: String,
    #[tabled(rename = "WORK DIR")]
    pub work_dir: String,
    #[tabled(rename = "WORKSPACE")]
    pub workspace_name: String,
    #[tabled(skip)]
    pub description: String,
}

impl PlannedWorkspace {
    pub fn new(repo: &str, dir: &str) -> Self {
        let dir = dir.trim_start_matches('/');
        let work_dir = format!("/{}", dir);
        Self {
            repo: repo.to_string(),
            workspace_name: format!("{}/{}", repo, dir),
            description: format!("Workflow for {}{}", repo, work_dir),
            work_dir,
        }
    }

    pub fn request(&self, opts: &WorkspaceOptions) -> CreateWorkspaceRequest {
        CreateWorkspaceRequest {
            runner_type: opts.runner_type.clone(),
            iac_type: opts.iac_type.clone(),
            workspace_name: self.workspace_name.clone(),
            vcs_id: opts.vcs_id.clone(),
            repo: self.repo.clone(),
            default_branch: opts.branch.clone(),
            vcs_type: opts.vcs_type.clone(),
            work_dir: self.work_dir.clone(),
            variables: opts.variables.clone(),
            execution: WorkspaceExecution {
                triggers: opts.triggers.clone(),
                apply_rule: opts.apply_rule.clone(),
                terraform_version: opts.terraform_version.clone(),
            },
            description: self.description.clone(),
            project: opts.project.clone(),
            consumed_variable_sets: opts.variable_sets.clone(),
        }
    }
}

/// One workspace per leaf directory, in mapping order.
///
/// Repositories recorded as failed in the mapping are skipped.
pub fn plan(mapping: &Mapping) -> Vec<PlannedWorkspace> {
    let mut planned = Vec::new();
    for (repo, entry) in mapping {
        match entry {
            RepoMapping::Failed { error } => {
                log::warn!("Skipping {}: mapping recorded an error ({})", repo, error);
            }
            RepoMapping::Tree(tree) => {
                let leaves = tree.leaf_directories();
                if leaves.is_empty() {
                    log::info!("No subdirectories found in {}", repo);
                }
                planned.extend(leaves.iter().map(|dir| PlannedWorkspace::new(repo, dir)));
            }
        }
    }
    planned
}

/// Results log entry for one workspace
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub repo: String,
    pub work_dir: String,
    pub workspace_name: String,
    pub description: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status_code: Option<u16>,
}

/// Results log written after a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationResults {
    pub total_repos: usize,
    pub total_workflows_created: usize,
    pub total_workflows_failed: usize,
    pub workflows: Vec<WorkflowResult>,
}

fn status_of(err: &Error) -> Option<u16> {
    match err {
        Error::Api(api) => api.status_code(),
        _ => None,
    }
}

/// Register each planned workspace; failures are recorded and the run goes on
pub async fn create_all<C>(
    client: &C,
    planned: &[PlannedWorkspace],
    opts: &WorkspaceOptions,
    total_repos: usize,
) -> CreationResults
where
    C: PlatformApi + ?Sized,
{
    let mut results = CreationResults {
        total_repos,
        ..Default::default()
    };

    for item in planned {
        println!("Creating workspace {}", item.workspace_name.bold());
        let mut entry = WorkflowResult {
            repo: item.repo.clone(),
            work_dir: item.work_dir.clone(),
            workspace_name: item.workspace_name.clone(),
            description: item.description.clone(),
            success: false,
            workspace_id: None,
            error: None,
            status_code: None,
        };

        match client.create_workspace(&item.request(opts)).await {
            Ok(created) => {
                println!("  {} created", "✓".green());
                entry.success = true;
                entry.workspace_id = created.get("id").and_then(Value::as_str).map(str::to_string);
                results.total_workflows_created += 1;
            }
            Err(e) => {
                println!("  {} failed: {}", "✗".red(), e);
                entry.status_code = status_of(&e);
                entry.error = Some(e.to_string());
                results.total_workflows_failed += 1;
            }
        }
        results.workflows.push(entry);
    }

    results
}
