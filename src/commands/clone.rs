//! Clone command implementation
//!
//! Clones or updates the whole tree and checks out one label everywhere,
//! falling back to the default branch where the label does not exist.

use anyhow::{bail, Result};
use clap::Args;

use release_tree::output::OutputConfig;
use release_tree::release_info::AUTO;

use super::{Context, TreeArgs};

/// Arguments for the clone command
#[derive(Args, Debug)]
pub struct CloneArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Tag or branch to check out ('auto' = the root's current branch)
    #[arg(short = 'b', long, default_value = AUTO)]
    pub branch: String,

    /// Root repository URL, required when the root is not cloned yet
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

/// Execute the clone command
pub fn execute(args: CloneArgs, output: &OutputConfig) -> Result<()> {
    let ctx = Context::new(&args.tree, output)?;
    let cloned = ctx.git().exists(ctx.work_root());
    if !cloned && args.url.is_none() {
        bail!(
            "{} is not a git repository, use --url to clone it",
            ctx.root().display()
        );
    }
    let label = if cloned {
        ctx.branch(&args.branch)?
    } else if args.branch == AUTO {
        bail!("Nothing to guess the branch from before the first clone, use -b");
    } else {
        args.branch.clone()
    };

    let remote = ctx.remote(ctx.remote_alias(), args.url.as_deref())?;
    let report = ctx.repository_set(remote).clone_or_update_all(&label)?;
    ctx.emit_report(&report)?;
    Ok(())
}
