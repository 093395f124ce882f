//! Perform command implementation
//!
//! Pushes what `prepare` produced: the release branch, the maintenance
//! branch when kept, and the `release-<tag>` tag, in every repository.
//! Without release parameters on the command line, they are read back from
//! the release log written by `prepare`.

use anyhow::Result;
use clap::Args;
use log::info;

use release_tree::output::{emoji, render_summary, OutputConfig};
use release_tree::release_log::ReleaseLog;

use super::{Context, ReleaseArgs, TreeArgs};

/// Arguments for the perform command
#[derive(Args, Debug)]
pub struct PerformArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    #[command(flatten)]
    pub release: ReleaseArgs,
}

/// Execute the perform command
pub fn execute(args: PerformArgs, output: &OutputConfig) -> Result<()> {
    let ctx = Context::new(&args.tree, output)?;
    let log_path = ReleaseLog::path_for(ctx.root());
    let from_log = !args.release.overrides_defaults()
        && args.tree.remote.is_none()
        && log_path.is_file();

    let (info, logged_snapshot) = if from_log {
        let log = ReleaseLog::read(ctx.root())?;
        let mut info = log.info;
        info.dry_run = args.release.dry_run;
        (info, log.snapshot)
    } else {
        let branch = ctx.branch(&args.release.branch)?;
        (args.release.to_info(ctx.remote_alias(), &branch)?, None)
    };

    let remote = ctx.remote(&info.remote_alias, None)?;
    let orchestrator = ctx.orchestrator(remote);
    orchestrator.repositories().update_root(&info.branch)?;
    let mut release = orchestrator.resolve(&info)?;
    if let Some(snapshot) = logged_snapshot.filter(|s| !s.is_empty()) {
        release.snapshot = snapshot;
    }
    println!(
        "{}",
        render_summary(output, "Release summary", &release.summary())
    );

    let report = orchestrator.perform_release(&release)?;
    ctx.emit_report(&report)?;
    if release.info.dry_run {
        info!("Dry run: nothing was pushed");
    }
    println!(
        "{} Released {}",
        emoji(output, "🚀", "[DONE]"),
        release.tag_name()
    );
    Ok(())
}
