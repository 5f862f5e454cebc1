use super::{CommandContext, CommandStatus};
use crate::detect::ChangeKind;
use crate::pipeline::{ScanOutcome, detect_changes, plan_scan, publish_scan};
use crate::publisher::{PrPublisher, PublishOutcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Print the patched Dockerfile instead of opening a pull request.
    #[arg(long)]
    dry_run: bool,

    /// Do nothing unless a manifest changed in the commit range.
    #[arg(long)]
    only_on_change: bool,

    /// Commit range for `--only-on-change` (default: HEAD~1..HEAD).
    #[arg(long, requires = "only_on_change")]
    range: Option<String>,
}

impl ScanCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        if self.only_on_change {
            let changes = detect_changes(&ctx.config, self.range.as_deref()).await?;
            if !changes.satisfies(ChangeKind::Manifest) {
                println!("No manifest changes ({changes}); nothing to scan");
                return Ok(CommandStatus::Success);
            }
        }

        let plan = plan_scan(&ctx.config)?;
        for drift in &plan.diff.url_drift {
            println!(
                "{} {} is already in the Dockerfile from {}; manifest asks for {}",
                "drift:".yellow(),
                drift.name,
                drift.recipe_url,
                drift.manifest_url
            );
        }
        for skipped in &plan.diff.skipped {
            println!("{} {}: {}", "skipped:".yellow(), skipped.file, skipped.reason);
        }

        if self.dry_run {
            match &plan.patch {
                Some(patch) => print!("{}", patch.content),
                None => println!("No new JARs to add"),
            }
            return Ok(CommandStatus::Success);
        }

        if plan.patch.is_none() {
            println!("{} No new JARs to add", "✓".green());
            return Ok(CommandStatus::Success);
        }

        let settings = ctx.hosting()?;
        let client = ctx.github(&settings)?;
        let publisher = PrPublisher::new(&client, settings.repo.full_name(), &ctx.config.base_branch);

        match publish_scan(&ctx.config, plan, &publisher).await? {
            ScanOutcome::Published {
                added,
                outcome,
            } => {
                match outcome {
                    PublishOutcome::Created {
                        number,
                        url,
                        ..
                    } => println!("{} Created PR #{} adding {}: {}", "✓".green(), number, added.join(", "), url),
                    PublishOutcome::SkippedAlreadyOpen {
                        number,
                        url,
                    } => println!("{} PR #{} is already open: {}", "✓".green(), number, url),
                }
            }
            ScanOutcome::NothingToAdd | ScanOutcome::GateClosed(_) => {
                println!("{} No new JARs to add", "✓".green());
            }
        }
        Ok(CommandStatus::Success)
    }
}
