use super::{CommandContext, CommandStatus};
use crate::image::DockerCli;
use crate::pipeline::build_stage;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::borrow::Cow;

#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Build only; do not push or write the handoff file.
    #[arg(long)]
    no_push: bool,

    /// Commit to tag the image from (default: CIRCLE_SHA1, else HEAD).
    #[arg(long)]
    commit: Option<String>,
}

impl BuildCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        let config = match self.commit {
            Some(commit) => {
                let mut config = ctx.config.clone();
                config.commit = Some(commit);
                Cow::Owned(config)
            }
            None => Cow::Borrowed(&ctx.config),
        };

        let artifact = build_stage(&config, &DockerCli, !self.no_push).await?;
        if artifact.pushed {
            println!("{} Pushed {}", "✓".green(), artifact.reference());
            println!("Image tag {} written to {}", artifact.tag, config.handoff_path.display());
        } else {
            println!("{} Built {} (not pushed)", "✓".green(), artifact.reference());
        }
        Ok(CommandStatus::Success)
    }
}
