use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bluesky rejects post text above 300 characters.
pub const DEFAULT_MAX_POST_LENGTH: usize = 300;
/// Bluesky's blob limit for images is just under 1 MB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1_000_000;

/// Ceilings applied to every post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_post_length: usize,
    pub max_image_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_post_length: DEFAULT_MAX_POST_LENGTH,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Read-only configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub default_branch: String,
    /// Directory holding the posts, relative to `repo_root`.
    pub posts_directory: PathBuf,
    /// Working tree the git commands run in; post paths are resolved against it.
    pub repo_root: PathBuf,
    pub limits: Limits,
}

impl PipelineConfig {
    pub fn new(default_branch: impl Into<String>, posts_directory: impl Into<PathBuf>) -> Self {
        Self {
            default_branch: default_branch.into(),
            posts_directory: posts_directory.into(),
            repo_root: PathBuf::from("."),
            limits: Limits::default(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            default_branch = %self.default_branch,
            posts_directory = %self.posts_directory.display(),
            repo_root = %self.repo_root.display(),
            max_post_length = self.limits.max_post_length,
            max_image_bytes = self.limits.max_image_bytes,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}
