use super::{CommandContext, CommandStatus};
use crate::pipeline::plan_scan;
use crate::utils::safe_write;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Writes directives straight into the checked-out Dockerfile, for builds that
/// should include manifests before their pull request is merged.
#[derive(Args, Debug)]
pub struct PatchRecipeCommand {}

impl PatchRecipeCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        let plan = plan_scan(&ctx.config)?;
        let Some(patch) = plan.patch else {
            println!("{} Dockerfile already fetches every manifest", "✓".green());
            return Ok(CommandStatus::Success);
        };

        let path = ctx.config.recipe_file();
        safe_write(&path, &patch.content)
            .with_context(|| format!("Failed to update {}", path.display()))?;
        println!("{} Added to {}: {}", "✓".green(), path.display(), patch.added.join(", "));
        Ok(CommandStatus::Success)
    }
}
