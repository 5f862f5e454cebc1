use super::{CommandContext, CommandStatus};
use crate::descriptor::{DescriptorOutcome, DescriptorPlan};
use crate::handoff::Handoff;
use crate::image::ImageTag;
use crate::pipeline::descriptor_updater;
use crate::publisher::{PrPublisher, PublishOutcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct UpdateDescriptorCommand {
    /// Image tag to deploy instead of the one in the handoff file.
    #[arg(long)]
    tag: Option<String>,

    /// Print the rewritten descriptor; no pull request, handoff file left in place.
    #[arg(long)]
    dry_run: bool,
}

impl UpdateDescriptorCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        let updater = descriptor_updater(&ctx.config)?;
        let handoff_path = &ctx.config.handoff_path;

        if self.dry_run {
            let tag = match self.tag.as_deref() {
                Some(tag) => ImageTag::parse(tag)?,
                None => Handoff::read(handoff_path)?.require(handoff_path)?,
            };
            match updater.plan(&tag)? {
                DescriptorPlan::AlreadyCurrent {
                    tag,
                } => println!("Descriptor already uses {tag}"),
                DescriptorPlan::Rewrite {
                    content, ..
                } => print!("{content}"),
            }
            return Ok(CommandStatus::Success);
        }

        // Credentials first, so a missing token does not consume the handoff.
        let settings = ctx.hosting()?;
        let client = ctx.github(&settings)?;

        let tag = match self.tag.as_deref() {
            Some(tag) => ImageTag::parse(tag)?,
            None => Handoff::take(handoff_path)?.require(handoff_path)?,
        };

        let publisher = PrPublisher::new(&client, settings.repo.full_name(), &ctx.config.base_branch);
        match updater.update(&tag, &publisher).await? {
            DescriptorOutcome::AlreadyCurrent {
                tag,
            } => println!("{} Image tag is already {}; no PR needed", "✓".green(), tag),
            DescriptorOutcome::Published {
                previous_tag,
                outcome,
            } => match outcome {
                PublishOutcome::Created {
                    number,
                    url,
                    ..
                } => println!("{} Created PR #{} ({} -> {}): {}", "✓".green(), number, previous_tag, tag, url),
                PublishOutcome::SkippedAlreadyOpen {
                    number,
                    url,
                } => println!("{} PR #{} is already open: {}", "✓".green(), number, url),
            },
        }
        Ok(CommandStatus::Success)
    }
}
