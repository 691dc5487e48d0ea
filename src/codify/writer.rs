//! Writes codify results as per-type Terraform files

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::Provider;
use super::format::{HclChunk, NameRegistry, format_hcl};
use crate::client::models::{CodifyRequest, CodifyResponse};
use crate::error::Result;

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid regex"));

pub const PROVIDER_FILE: &str = "provider.tf";
pub const IMPORT_COMMANDS_FILE: &str = "import_commands.sh";

/// Provider block written for Azure when the API returns none
pub const AZURE_PROVIDER_FALLBACK: &str = "provider \"azurerm\" {\n  features {}\n}\n";

/// File stem for an asset type: runs of unsafe characters become `_`
pub fn sanitize_file_stem(asset_type: &str) -> String {
    let replaced = UNSAFE_FILE_CHARS.replace_all(asset_type, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "misc".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Files written by [`CodifyWriter::finish`]
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub tf_files: Vec<PathBuf>,
    pub provider_file: Option<PathBuf>,
    pub import_commands: usize,
    pub renamed: usize,
}

/// Accumulates codify responses, then writes them out in one go.
pub struct CodifyWriter {
    provider: Provider,
    keep_comments: bool,
    chunks: BTreeMap<String, Vec<String>>,
    names: NameRegistry,
    provider_block: Option<String>,
    import_commands: Vec<String>,
}

impl CodifyWriter {
    pub fn new(provider: Provider, keep_comments: bool) -> Self {
        Self {
            provider,
            keep_comments,
            chunks: BTreeMap::new(),
            names: NameRegistry::new(),
            provider_block: None,
            import_commands: Vec::new(),
        }
    }

    /// Add one successful codify response.
    ///
    /// Resource names already used by an earlier response get a `_N`
    /// suffix, and the response's import blocks follow the rename.
    pub fn add(&mut self, request: &CodifyRequest, response: &CodifyResponse) {
        let asset_type = match request.asset_type.trim() {
            "" => "misc".to_string(),
            ty => ty.to_string(),
        };

        if self.provider_block.is_none() {
            self.provider_block = response
                .provider_block
                .as_deref()
                .map(|block| format_hcl(block, self.keep_comments))
                .filter(|block| is_provider_block(block));
        }

        let mut renames: HashMap<(String, String), String> = HashMap::new();
        let mut pieces = Vec::new();

        if let Some(text) = response.codified_result.as_deref().filter(|t| !t.trim().is_empty()) {
            let chunk = HclChunk::parse(text, self.keep_comments);
            for (ty, name) in chunk.resources() {
                let assigned = self.names.claim(&ty, &name);
                if assigned != name {
                    log::info!("Renamed duplicate resource {}.{} to {}", ty, name, assigned);
                    renames.insert((ty, name), assigned);
                }
            }
            pieces.push(chunk.rename_resources(&renames).render());
        }

        for block in response.import_block_texts() {
            let chunk = HclChunk::parse(&block, self.keep_comments);
            pieces.push(chunk.rename_import_targets(&renames).render());
        }

        if let Some(command) = response.import_command.as_deref().filter(|c| !c.trim().is_empty()) {
            self.import_commands
                .push(rename_in_command(command.trim(), &renames));
        }

        self.chunks.entry(asset_type).or_default().extend(pieces);
    }

    /// Write `<type>.tf` files, `provider.tf` and `import_commands.sh`
    pub fn finish(self, out_dir: &Path) -> Result<WriteSummary> {
        fs::create_dir_all(out_dir)?;
        let mut summary = WriteSummary {
            renamed: self.names.renamed(),
            import_commands: self.import_commands.len(),
            ..Default::default()
        };

        for (asset_type, pieces) in &self.chunks {
            if pieces.is_empty() {
                continue;
            }
            let path = out_dir.join(format!("{}.tf", sanitize_file_stem(asset_type)));
            fs::write(&path, pieces.join("\n"))?;
            summary.tf_files.push(path);
        }

        let provider_block = match (self.provider_block, self.provider) {
            (Some(block), _) => Some(block),
            (None, Provider::Azure) => Some(AZURE_PROVIDER_FALLBACK.to_string()),
            (None, Provider::Aws) => None,
        };
        if let Some(block) = provider_block {
            let path = out_dir.join(PROVIDER_FILE);
            fs::write(&path, block)?;
            summary.provider_file = Some(path);
        }

        let mut script = String::from("#!/usr/bin/env bash\n# terraform import commands for codified resources\nset -e\n\n");
        for command in &self.import_commands {
            script.push_str(command);
            script.push('\n');
        }
        let script_path = out_dir.join(IMPORT_COMMANDS_FILE);
        fs::write(&script_path, script)?;
        make_executable(&script_path)?;

        Ok(summary)
    }
}

/// A provider block worth writing, not an empty shell
fn is_provider_block(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("provider") && trimmed.contains('{') && trimmed.ends_with('}')
}

/// Rewrite `type.name` addresses in a CLI import command
fn rename_in_command(command: &str, renames: &HashMap<(String, String), String>) -> String {
    command
        .split(' ')
        .map(|word| {
            word.split_once('.')
                .and_then(|(ty, name)| renames.get(&(ty.to_string(), name.to_string())).map(|n| (ty, n)))
                .map(|(ty, new)| format!("{}.{}", ty, new))
                .unwrap_or_else(|| word.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
