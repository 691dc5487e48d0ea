//! Governance policy listing command

use colored::Colorize;

use crate::cli::{CommandContext, GlobalOptions, ListArgs};
use crate::error::Result;
use crate::governance::{self, DEFAULT_ASSET_STATES};
use crate::output::Formattable;

/// States to query: the given ones, or every state
pub fn asset_states(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        DEFAULT_ASSET_STATES.iter().map(|s| s.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

pub async fn run(opts: &GlobalOptions, args: &ListArgs) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;
    let states = asset_states(&args.states);

    let result = governance::list_policy_arns(&*ctx.client, &args.policy_id, &states).await?;
    result.write_to(&args.out)?;
    result.print(args.format)?;

    eprintln!(
        "{} {} ARNs for '{}' written to {}",
        "✓".green(),
        result.arns.len(),
        result.policy_name,
        args.out.display()
    );
    for failed in result.failed_states() {
        eprintln!(
            "{} state '{}' failed: {}",
            "⚠".yellow(),
            failed.state,
            failed.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_states_default() {
        assert_eq!(
            asset_states(&[]),
            vec!["managed", "unmanaged", "ghost", "modified"]
        );
        assert_eq!(asset_states(&["ghost".to_string()]), vec!["ghost"]);
    }
}
