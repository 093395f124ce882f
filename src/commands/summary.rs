//! Summary command implementation
//!
//! Shows the release that `prepare` would make from the root working copy
//! as it is, without fetching or changing anything.

use anyhow::Result;
use chrono::Local;
use clap::Args;
use serde::Serialize;

use release_tree::output::{render_summary, OutputConfig};
use release_tree::release_info::ResolvedRelease;
use release_tree::version::VersionIdentifier;

use super::{Context, ReleaseArgs, TreeArgs};

/// Arguments for the summary command
#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Print the resolved release as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the summary command
pub fn execute(args: SummaryArgs, output: &OutputConfig) -> Result<()> {
    let ctx = Context::new(&args.tree, output)?;
    let branch = ctx.branch(&args.release.branch)?;
    let info = args.release.to_info(ctx.remote_alias(), &branch)?;
    let current = VersionIdentifier::parse(&ctx.discovery().version(&ctx.descriptor())?)?;
    let release = info.resolve_at(&current, Local::now().naive_local())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&SummaryJson::from(&release))?);
    } else {
        println!(
            "{}",
            render_summary(output, "Release summary", &release.summary())
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SummaryJson {
    branch: String,
    snapshot: String,
    tag: String,
    next_snapshot: String,
    maintenance_branch: Option<String>,
    maintenance_version: Option<String>,
}

impl From<&ResolvedRelease> for SummaryJson {
    fn from(release: &ResolvedRelease) -> Self {
        let maintenance_version = release.info.maintenance.version().map(str::to_string);
        Self {
            branch: release.info.branch.clone(),
            snapshot: release.snapshot.clone(),
            tag: release.tag_name(),
            next_snapshot: release.next_snapshot.clone(),
            maintenance_branch: maintenance_version
                .as_ref()
                .map(|_| release.maintenance_branch.clone()),
            maintenance_version,
        }
    }
}
