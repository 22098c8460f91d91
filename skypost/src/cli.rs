//!
//! CLI glue for skypost: argument parsing and the `run` entrypoint.
//!
//! All pipeline logic (detection, classification, publishing dispatch) lives in
//! `skypost-core`; this module wires it to git, HTTP and Bluesky and prints the report.
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use skypost_core::detect::GitCli;
use skypost_core::fetch::HttpImageFetcher;
use skypost_core::pipeline::collect_posts;
use skypost_core::publish::publish_posts;

use crate::bluesky::{BlueskyClient, BlueskyCredentials};
use crate::load_config::load_config;

/// Publish newly added Markdown posts from a Git repository to Bluesky.
#[derive(Parser, Debug)]
#[clap(
    name = "skypost",
    version,
    about = "Publish newly added Markdown posts from a Git repository to Bluesky"
)]
pub struct Cli {
    /// Name of the default Git branch
    #[clap(long)]
    pub default_branch: String,

    /// Look in this subdirectory for new posts
    #[clap(long)]
    pub posts_directory: PathBuf,

    /// Prepare and print the posts without publishing them
    #[clap(long)]
    pub dry_run: bool,

    /// Optional YAML file with limits and Bluesky service settings
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Root of the Git working tree
    #[clap(long, default_value = ".")]
    pub repo_root: PathBuf,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_config(&cli)?;
    settings.pipeline.trace_loaded();

    let git = GitCli::new(&settings.pipeline.repo_root);
    let fetcher = HttpImageFetcher::new();
    let report = collect_posts(&settings.pipeline, &git, &fetcher).await?;
    print!("{report}");

    if settings.dry_run {
        tracing::info!(posts = report.len(), "Dry run, skipping publish");
        println!("Dry run: nothing published.");
        return Ok(());
    }

    if report.is_empty() {
        println!("No posts to publish.");
        return Ok(());
    }

    let credentials = BlueskyCredentials::from_env()?;
    let client = BlueskyClient::login(&settings.bluesky_service, &credentials).await?;
    let published = publish_posts(report.into_posts(), &client).await?;
    println!("Published {published} post(s).");
    Ok(())
}
