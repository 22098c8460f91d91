//! High-level pipeline: detect added posts, then classify every one of them.
//!
//! Classification is all-or-nothing: the report is only produced once every detected
//! file has become a valid [`PostVariant`], so a publisher never sees a partial batch.
//!
//! # Navigation
//! - Main entrypoint: [`collect_posts`]
//! - Publishing the result: [`crate::publish::publish_posts`] with [`PipelineReport::into_posts`]

use std::fmt;

use tracing::{error, info};

use crate::classify::prepare_post;
use crate::config::PipelineConfig;
use crate::contract::{AddedFile, GitRunner, ImageFetcher, PipelineError, PostVariant};
use crate::detect::detect_added_posts;

/// A classified post together with the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPost {
    pub source: AddedFile,
    pub post: PostVariant,
}

/// Every post of one run, in detection order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub posts: Vec<PreparedPost>,
}

impl PipelineReport {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Hands the posts over for publishing.
    pub fn into_posts(self) -> Vec<PostVariant> {
        self.posts.into_iter().map(|prepared| prepared.post).collect()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.posts.is_empty() {
            return writeln!(f, "No new posts found.");
        }
        writeln!(f, "{} new post(s):", self.posts.len())?;
        for prepared in &self.posts {
            writeln!(
                f,
                "- {} ({}): {:?}",
                prepared.source.path().display(),
                prepared.post.kind(),
                prepared.post.text()
            )?;
        }
        Ok(())
    }
}

/// Detects the added posts and prepares each of them, stopping at the first failure.
pub async fn collect_posts<G, F>(
    config: &PipelineConfig,
    git: &G,
    fetcher: &F,
) -> Result<PipelineReport, PipelineError>
where
    G: GitRunner + ?Sized,
    F: ImageFetcher + ?Sized,
{
    info!("Starting post pipeline");

    let files = detect_added_posts(git, &config.default_branch, &config.posts_directory)?;

    let mut posts = Vec::with_capacity(files.len());
    for file in files {
        match prepare_post(&file, config, fetcher).await {
            Ok(post) => posts.push(PreparedPost { source: file, post }),
            Err(e) => {
                error!(error = %e, path = %file.path().display(), "Post preparation failed");
                return Err(e);
            }
        }
    }

    info!(count = posts.len(), "Post pipeline complete");
    Ok(PipelineReport { posts })
}
