//! Prepare command implementation
//!
//! Brings the tree onto the release branch, stores the release parameters
//! in `release-<root>.log`, then in every repository: creates the
//! maintenance branch, sets the released versions, commits, tags and moves
//! the release branch to the next snapshot. Nothing is pushed.

use anyhow::Result;
use clap::Args;

use release_tree::output::{emoji, render_summary, OutputConfig};

use super::{Context, ReleaseArgs, TreeArgs};

/// Arguments for the prepare command
#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    #[command(flatten)]
    pub release: ReleaseArgs,
}

/// Execute the prepare command
pub fn execute(args: PrepareArgs, output: &OutputConfig) -> Result<()> {
    let ctx = Context::new(&args.tree, output)?;
    let remote = ctx.remote(ctx.remote_alias(), None)?;
    let branch = ctx.branch(&args.release.branch)?;
    let info = args.release.to_info(remote.alias(), &branch)?;
    let orchestrator = ctx.orchestrator(remote);

    let prepared = orchestrator.prepare_release(&info)?;
    println!(
        "{}",
        render_summary(output, "Release summary", &prepared.release.summary())
    );
    ctx.emit_report(&prepared.report)?;

    let tagged = orchestrator.tag_release(&prepared.release, &prepared.report)?;
    println!(
        "{} Tagged {} in {} repositories",
        emoji(output, "🏷️ ", "[TAG]"),
        prepared.release.tag_name(),
        tagged.len()
    );
    println!("Release parameters stored in {}", prepared.log_path.display());
    Ok(())
}
