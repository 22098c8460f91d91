//! Change detection: which Markdown posts did the current change add?
//!
//! CI can observe a repository in several states (a pull request branch before merge,
//! the very first commit, a fast-forward or a merge commit on the default branch).
//! Each state needs a different diff, so [`detect_added_posts`] walks an ordered list of
//! [`DiffStrategy`] values and stops at the first one that finds posts.

use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info};

use crate::contract::{AddedFile, GitRunner, PipelineError};

const MARKDOWN_EXTENSION: &str = "md";

/// Runs the real `git` binary inside a working tree.
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }
}

impl GitRunner for GitCli {
    fn run(&self, args: &[String]) -> Result<String, PipelineError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                debug!(
                    command = %command,
                    repo_root = %self.repo_root.display(),
                    "Git command succeeded"
                );
                Ok(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                error!(
                    command = %command,
                    repo_root = %self.repo_root.display(),
                    status = ?out.status,
                    stderr = %stderr.trim(),
                    "Git exited with non-zero code"
                );
                Err(PipelineError::Git(format!(
                    "Command failed: {command}: {}",
                    stderr.trim()
                )))
            }
            Err(e) => {
                error!(
                    error = ?e,
                    command = %command,
                    repo_root = %self.repo_root.display(),
                    "Failed to launch git process"
                );
                Err(PipelineError::Git(format!("Command not found: {command}: {e}")))
            }
        }
    }
}

/// One way of asking git for added files. Evaluated in [`DiffStrategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStrategy {
    /// Merge-base with `origin/<default branch>` against the current tree (open pull request).
    MergeBase,
    /// Empty tree against `HEAD`, only when `HEAD` is a root commit.
    FirstCommit,
    /// `HEAD~1` against `HEAD` (fast-forward or squash on the default branch).
    ParentCommit,
    /// `HEAD~2` against `HEAD` (merge commit at `HEAD`).
    MergeParent,
}

impl DiffStrategy {
    pub const ORDER: [DiffStrategy; 4] = [
        DiffStrategy::MergeBase,
        DiffStrategy::FirstCommit,
        DiffStrategy::ParentCommit,
        DiffStrategy::MergeParent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DiffStrategy::MergeBase => "merge-base",
            DiffStrategy::FirstCommit => "first-commit",
            DiffStrategy::ParentCommit => "parent-commit",
            DiffStrategy::MergeParent => "merge-parent",
        }
    }

    /// Raw (unfiltered) added paths reported by this strategy.
    pub fn added_paths<G>(self, git: &G, default_branch: &str) -> Result<Vec<String>, PipelineError>
    where
        G: GitRunner + ?Sized,
    {
        match self {
            DiffStrategy::MergeBase => diff_added(git, &[format!("origin/{default_branch}...")]),
            DiffStrategy::FirstCommit => {
                if !is_first_commit(git)? {
                    return Ok(Vec::new());
                }
                let empty_tree = empty_tree_hash(git)?;
                diff_added(git, &[empty_tree, "HEAD".to_string()])
            }
            DiffStrategy::ParentCommit => {
                diff_added(git, &["HEAD~1".to_string(), "HEAD".to_string()])
            }
            DiffStrategy::MergeParent => {
                diff_added(git, &["HEAD~2".to_string(), "HEAD".to_string()])
            }
        }
    }
}

/// Returns the posts added by the current change, or an empty list when there are none.
///
/// Any git failure is fatal: a broken repository is not treated as "no posts".
pub fn detect_added_posts<G>(
    git: &G,
    default_branch: &str,
    posts_directory: &Path,
) -> Result<Vec<AddedFile>, PipelineError>
where
    G: GitRunner + ?Sized,
{
    let posts_directory = normalize_dir(posts_directory);
    info!(
        default_branch,
        posts_directory = %posts_directory.display(),
        "Detecting added posts"
    );

    for strategy in DiffStrategy::ORDER {
        let raw = strategy.added_paths(git, default_branch)?;
        let added = filter_markdown_posts(raw.iter().map(String::as_str), &posts_directory);
        debug!(
            strategy = strategy.name(),
            added_paths = raw.len(),
            matching_posts = added.len(),
            "Diff strategy evaluated"
        );
        if !added.is_empty() {
            info!(
                strategy = strategy.name(),
                count = added.len(),
                "Detected added posts"
            );
            return Ok(added);
        }
    }

    info!("No added posts detected");
    Ok(Vec::new())
}

/// Keeps Markdown files inside `posts_directory`. Containment is checked per path
/// component, so `posts-old/a.md` is not inside `posts`.
pub fn filter_markdown_posts<'a, I>(paths: I, posts_directory: &Path) -> Vec<AddedFile>
where
    I: IntoIterator<Item = &'a str>,
{
    let root = normalize_dir(posts_directory);
    paths
        .into_iter()
        .map(AddedFile::new)
        .filter(|file| file.suffix() == Some(MARKDOWN_EXTENSION))
        .filter(|file| file.path().starts_with(&root))
        .collect()
}

fn normalize_dir(dir: &Path) -> PathBuf {
    dir.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn diff_added<G>(git: &G, revisions: &[String]) -> Result<Vec<String>, PipelineError>
where
    G: GitRunner + ?Sized,
{
    let mut args: Vec<String> = [
        "-c",
        "core.quotePath=false",
        "diff",
        "--name-only",
        "--diff-filter=A",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(revisions.iter().cloned());

    let stdout = git.run(&args)?;
    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn is_first_commit<G>(git: &G) -> Result<bool, PipelineError>
where
    G: GitRunner + ?Sized,
{
    let args = ["rev-list", "--parents", "-n", "1", "HEAD"].map(String::from);
    let parents = git.run(&args)?;
    // The commit itself plus one hash per parent.
    Ok(parents.split_whitespace().count() == 1)
}

fn empty_tree_hash<G>(git: &G) -> Result<String, PipelineError>
where
    G: GitRunner + ?Sized,
{
    let args = ["hash-object", "-t", "tree", "/dev/null"].map(String::from);
    Ok(git.run(&args)?.trim().to_string())
}
