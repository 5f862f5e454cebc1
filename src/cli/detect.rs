use super::{CommandContext, CommandStatus};
use crate::detect::ChangeKind;
use crate::pipeline::detect_changes;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::str::FromStr;

#[derive(Args, Debug)]
pub struct DetectCommand {
    /// Commit range to inspect, e.g. `abc123..def456` (default: HEAD~1..HEAD).
    #[arg(long)]
    range: Option<String>,

    /// Exit with status 2 unless this kind of change happened: manifest, recipe or any.
    #[arg(long, value_name = "KIND")]
    require: Option<String>,

    /// Print the classification as JSON.
    #[arg(long)]
    json: bool,
}

impl DetectCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        // Parsed before touching git so a misconfigured gate fails loudly.
        let required = self.require.as_deref().map(ChangeKind::from_str).transpose()?;

        let changes = detect_changes(&ctx.config, self.range.as_deref()).await?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&changes).context("Failed to serialize classification")?
            );
        } else {
            println!("{changes}");
        }

        match required {
            Some(kind) if !changes.satisfies(kind) => {
                eprintln!("{} required change not present; downstream steps skipped", "gate closed:".yellow());
                Ok(CommandStatus::GateClosed)
            }
            _ => Ok(CommandStatus::Success),
        }
    }
}
