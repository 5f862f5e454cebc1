use super::{CommandContext, CommandStatus};
use crate::descriptor::DescriptorOutcome;
use crate::image::DockerCli;
use crate::pipeline::{self, RunReport, ScanOutcome};
use crate::publisher::PrPublisher;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::error;

#[derive(Args, Debug)]
pub struct RunCommand {
    /// Skip the scan unless a manifest changed in the commit range.
    #[arg(long)]
    only_on_change: bool,

    /// Commit range for `--only-on-change` (default: HEAD~1..HEAD).
    #[arg(long, requires = "only_on_change")]
    range: Option<String>,
}

impl RunCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<CommandStatus> {
        let settings = match ctx.hosting() {
            Ok(settings) => settings,
            Err(e) => {
                // Without credentials only the build can proceed.
                error!("Pull request stages cannot run: {:#}", e);
                match pipeline::build_stage(&ctx.config, &DockerCli, true).await {
                    Ok(artifact) => println!("{} Pushed {}", "✓".green(), artifact.reference()),
                    Err(build_err) => error!("Build stage failed: {:#}", build_err),
                }
                return Err(e);
            }
        };
        let client = ctx.github(&settings)?;
        let publisher = PrPublisher::new(&client, settings.repo.full_name(), &ctx.config.base_branch);

        let gate = self.only_on_change.then_some(self.range.as_deref());
        let report = pipeline::run(&ctx.config, &publisher, &DockerCli, gate).await;
        summarize(report)
    }
}

fn summarize(report: RunReport) -> Result<CommandStatus> {
    let failed = report.failed_stages();

    let line = |name: &str, ok: bool, detail: String| {
        let mark = if ok { "✓".green() } else { "✗".red() };
        println!("{mark} {name:<10} {detail}");
    };
    match &report.scan {
        Ok(ScanOutcome::GateClosed(changes)) => line("scan", true, format!("skipped ({changes})")),
        Ok(ScanOutcome::NothingToAdd) => line("scan", true, "no new JARs".to_string()),
        Ok(ScanOutcome::Published {
            added,
            outcome,
        }) => line("scan", true, format!("{}: {}", added.join(", "), outcome)),
        Err(e) => line("scan", false, format!("{e:#}")),
    }
    match &report.build {
        Ok(artifact) => line("build", true, artifact.reference()),
        Err(e) => line("build", false, format!("{e:#}")),
    }
    match &report.descriptor {
        Ok(DescriptorOutcome::AlreadyCurrent {
            tag,
        }) => line("descriptor", true, format!("already {tag}")),
        Ok(DescriptorOutcome::Published {
            previous_tag,
            outcome,
        }) => line("descriptor", true, format!("from {previous_tag}: {outcome}")),
        Err(e) => line("descriptor", false, format!("{e:#}")),
    }

    if failed.is_empty() {
        return Ok(CommandStatus::Success);
    }
    let summary = format!("Pipeline stage(s) failed: {}", failed.join(", "));
    let first = [report.scan.err(), report.build.err(), report.descriptor.err()]
        .into_iter()
        .flatten()
        .next();
    match first {
        Some(e) => Err(e.context(summary)),
        None => Err(anyhow::anyhow!(summary)),
    }
}
