//! HCL cleanup and resource renaming
//!
//! Generated configuration is parsed with `hcl-rs` and printed back with its
//! formatter. Text that does not parse is kept as-is apart from whitespace.

use std::collections::HashMap;

use hcl::{Block, BlockLabel, Body, Expression, Structure};

/// Header lines the codify endpoint prepends to generated blocks
const GENERATED_HEADER: &str = "# ---";

/// Drop generated `# ---` header lines unless `keep_comments` is set
pub fn strip_headers(text: &str, keep_comments: bool) -> String {
    if keep_comments {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with(GENERATED_HEADER))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comment lines before the first block; the parser drops comments
fn leading_comments(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with('#') || line.starts_with("//"))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Trim trailing spaces and collapse runs of blank lines
fn tidy_whitespace(text: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// A chunk of generated configuration
#[derive(Debug, Clone)]
pub enum HclChunk {
    /// Parsed body; `source` is the text it came from
    Parsed {
        body: Body,
        comments: Vec<String>,
        source: String,
    },
    /// Text that did not parse
    Raw(String),
}

impl HclChunk {
    pub fn parse(text: &str, keep_comments: bool) -> Self {
        let text = strip_headers(text, keep_comments);
        match hcl::parse(&text) {
            Ok(body) => HclChunk::Parsed {
                body,
                comments: if keep_comments {
                    leading_comments(&text).into_iter().map(str::to_string).collect()
                } else {
                    Vec::new()
                },
                source: text,
            },
            Err(e) => {
                log::debug!("Keeping unparsable HCL as-is: {}", e);
                HclChunk::Raw(text)
            }
        }
    }

    /// `(type, name)` of every resource block, in order
    pub fn resources(&self) -> Vec<(String, String)> {
        match self {
            HclChunk::Parsed { body, .. } => body
                .iter()
                .filter_map(|s| match s {
                    Structure::Block(block) => resource_address(block),
                    _ => None,
                })
                .collect(),
            HclChunk::Raw(_) => Vec::new(),
        }
    }

    /// Rename resource blocks; `renames` maps `(type, old name)` to the new name
    pub fn rename_resources(self, renames: &HashMap<(String, String), String>) -> Self {
        self.map_blocks(|mut block| {
            if let Some(address) = resource_address(&block) {
                if let Some(new_name) = renames.get(&address) {
                    block.labels[1] = BlockLabel::String(new_name.clone());
                }
            }
            block
        })
    }

    /// Point `import { to = type.name }` targets at renamed resources
    pub fn rename_import_targets(self, renames: &HashMap<(String, String), String>) -> Self {
        self.map_blocks(|block| {
            if block.identifier() != "import" {
                return block;
            }
            let Block {
                identifier,
                labels,
                body,
            } = block;
            let body: Body = body
                .into_iter()
                .map(|structure| match structure {
                    Structure::Attribute(mut attr) if attr.key() == "to" => {
                        if let Some(expr) = import_target(&attr.expr)
                            .and_then(|address| renames.get(&address).map(|name| (address.0, name)))
                            .and_then(|(ty, name)| target_expression(&ty, name))
                        {
                            attr.expr = expr;
                        }
                        Structure::Attribute(attr)
                    }
                    other => other,
                })
                .collect();
            Block {
                identifier,
                labels,
                body,
            }
        })
    }

    fn map_blocks(self, f: impl Fn(Block) -> Block) -> Self {
        match self {
            HclChunk::Parsed {
                body,
                comments,
                source,
            } => HclChunk::Parsed {
                body: body
                    .into_iter()
                    .map(|s| match s {
                        Structure::Block(block) => Structure::Block(f(block)),
                        other => other,
                    })
                    .collect(),
                comments,
                source,
            },
            raw => raw,
        }
    }

    /// Formatted text ending in a single newline
    pub fn render(&self) -> String {
        match self {
            HclChunk::Parsed {
                body,
                comments,
                source,
            } => render_parsed(
                hcl::format::to_string(body).map_err(|e| e.to_string()),
                comments,
                source,
            ),
            HclChunk::Raw(text) => tidy_whitespace(text),
        }
    }
}

/// Formatter output behind its comments, or the source text if formatting failed
fn render_parsed(formatted: Result<String, String>, comments: &[String], source: &str) -> String {
    let formatted = match formatted {
        Ok(text) => text,
        Err(e) => {
            log::warn!(
                "HCL formatter failed, writing the block unformatted and without renames: {}",
                e
            );
            return tidy_whitespace(source);
        }
    };
    let mut out = String::new();
    for comment in comments {
        out.push_str(comment);
        out.push('\n');
    }
    out.push_str(&formatted);
    tidy_whitespace(&out)
}

/// Pretty-print one chunk of HCL
pub fn format_hcl(text: &str, keep_comments: bool) -> String {
    HclChunk::parse(text, keep_comments).render()
}

fn resource_address(block: &Block) -> Option<(String, String)> {
    if block.identifier() != "resource" {
        return None;
    }
    match block.labels() {
        [ty, name] => Some((ty.as_str().to_string(), name.as_str().to_string())),
        _ => None,
    }
}

/// `(type, name)` named by an import block's `to` expression
fn import_target(expr: &Expression) -> Option<(String, String)> {
    let text = hcl::format::to_string(expr).ok()?;
    let (ty, name) = text.trim().split_once('.')?;
    if name.contains('.') || name.contains('[') {
        return None;
    }
    Some((ty.to_string(), name.to_string()))
}

fn target_expression(ty: &str, name: &str) -> Option<Expression> {
    let body = hcl::parse(&format!("to = {}.{}\n", ty, name)).ok()?;
    body.into_iter().find_map(|s| match s {
        Structure::Attribute(attr) => Some(attr.expr),
        _ => None,
    })
}

/// Allocates resource names that are unique per resource type.
///
/// The first resource to claim a name keeps it; later ones get `_1`, `_2`
/// and so on, skipping suffixes already taken.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: std::collections::HashSet<(String, String)>,
    renamed: usize,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for `ty`, returning the name actually assigned
    pub fn claim(&mut self, ty: &str, name: &str) -> String {
        if self.taken.insert((ty.to_string(), name.to_string())) {
            return name.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{}_{}", name, counter);
            if self.taken.insert((ty.to_string(), candidate.clone())) {
                self.renamed += 1;
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn renamed(&self) -> usize {
        self.renamed
    }
}
