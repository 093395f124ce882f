//! Maintenance command implementation
//!
//! Creates a maintenance branch from an existing `release-<tag>` in every
//! repository and moves it to a maintenance snapshot.

use anyhow::{bail, Result};
use clap::Args;

use release_tree::orchestrator::MaintenanceRequest;
use release_tree::output::{emoji, render_summary, OutputConfig};
use release_tree::release_info::{OtherVersions, AUTO, TAG_PREFIX};

use super::{Context, TreeArgs};

/// Arguments for the maintenance command
#[derive(Args, Debug)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Maintenance branch ('auto' = the tag)
    #[arg(short = 'b', long, default_value = AUTO)]
    pub branch: String,

    /// Released version to branch from, without the 'release-' prefix
    /// ('auto' = the tag the root is on)
    #[arg(short = 't', long, default_value = AUTO)]
    pub tag: String,

    /// Maintenance version ('auto' = '<TAG>.1-SNAPSHOT')
    #[arg(short = 'm', long, default_value = AUTO)]
    pub maintenance: String,

    /// Other versions to replace: '[files:props:]old/new[/next],...'
    #[arg(long = "arv", alias = "also-replace-version", value_name = "VERSIONS")]
    pub other_versions: Option<String>,

    /// Message put in front of commit messages
    #[arg(long = "mc", alias = "msg-commit", default_value = "")]
    pub msg_commit: String,
}

/// Execute the maintenance command
pub fn execute(args: MaintenanceArgs, output: &OutputConfig) -> Result<()> {
    let ctx = Context::new(&args.tree, output)?;
    let tag = if args.tag == AUTO {
        guess_tag(&ctx)?
    } else {
        args.tag.trim_start_matches(TAG_PREFIX).to_string()
    };
    let request = MaintenanceRequest {
        tag,
        branch: explicit(&args.branch),
        version: explicit(&args.maintenance),
        other_versions: match &args.other_versions {
            Some(value) => OtherVersions::parse(value)?,
            None => OtherVersions::default(),
        },
        msg_commit: args.msg_commit,
    };

    let remote = ctx.remote(ctx.remote_alias(), None)?;
    let orchestrator = ctx.orchestrator(remote);
    let (maintenance, report) = orchestrator.maintenance(&request)?;
    println!(
        "{}",
        render_summary(output, "Maintenance summary", &maintenance.summary())
    );
    ctx.emit_report(&report)?;
    println!(
        "{} Maintenance branch {} created at {}",
        emoji(output, "🌿", "[BRANCH]"),
        maintenance.branch,
        maintenance.version
    );
    Ok(())
}

fn explicit(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == AUTO {
        None
    } else {
        Some(value.to_string())
    }
}

/// The released version the root is on, from its `release-` tag.
fn guess_tag(ctx: &Context) -> Result<String> {
    let head = ctx.git().head_tag(ctx.work_root())?;
    match head.as_deref().and_then(|t| t.strip_prefix(TAG_PREFIX)) {
        Some(tag) if !tag.is_empty() => Ok(tag.to_string()),
        _ => bail!(
            "Couldn't guess tag name from {}",
            head.as_deref().unwrap_or("a HEAD without tag")
        ),
    }
}
