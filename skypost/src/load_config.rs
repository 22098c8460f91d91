use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use skypost_core::config::{Limits, PipelineConfig};
use tracing::{error, info};

use crate::bluesky::DEFAULT_SERVICE;
use crate::cli::Cli;

#[derive(Deserialize, Default)]
#[serde(default)]
struct StaticConfig {
    limits: LimitsSection,
    bluesky: BlueskySection,
}

#[derive(Deserialize)]
#[serde(default)]
struct LimitsSection {
    max_post_length: usize,
    max_image_bytes: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_post_length: limits.max_post_length,
            max_image_bytes: limits.max_image_bytes,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct BlueskySection {
    service: String,
}

impl Default for BlueskySection {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
        }
    }
}

/// Everything a run needs besides credentials.
#[derive(Debug)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub bluesky_service: String,
    pub dry_run: bool,
}

/// Merges CLI arguments with the optional YAML config file (no secrets in it).
pub fn load_config(cli: &Cli) -> Result<Settings> {
    let static_conf = match &cli.config {
        Some(path) => read_static_config(path)?,
        None => {
            info!("No config file given, using default limits");
            StaticConfig::default()
        }
    };

    let posts_directory = resolve_posts_directory(&cli.repo_root, &cli.posts_directory)?;

    let pipeline = PipelineConfig {
        default_branch: cli.default_branch.clone(),
        posts_directory,
        repo_root: cli.repo_root.clone(),
        limits: Limits {
            max_post_length: static_conf.limits.max_post_length,
            max_image_bytes: static_conf.limits.max_image_bytes,
        },
    };

    info!(
        service = %static_conf.bluesky.service,
        dry_run = cli.dry_run,
        "Config loaded and merged successfully"
    );

    Ok(Settings {
        pipeline,
        bluesky_service: static_conf.bluesky.service,
        dry_run: cli.dry_run,
    })
}

fn read_static_config(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            anyhow::bail!("Failed to read config file {:?}: {}", path, e);
        }
    };

    match serde_yaml::from_str::<Option<StaticConfig>>(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            anyhow::bail!("Failed to parse config YAML: {e}")
        }
    }
}

/// The posts directory must exist. It is kept relative to the repository root because
/// git reports added files relative to it.
fn resolve_posts_directory(repo_root: &Path, posts_directory: &Path) -> Result<PathBuf> {
    let relative = if posts_directory.is_absolute() {
        let root = repo_root
            .canonicalize()
            .with_context(|| format!("Repository root {} does not exist", repo_root.display()))?;
        let dir = posts_directory.canonicalize().with_context(|| {
            format!("Posts directory {} does not exist", posts_directory.display())
        })?;
        match dir.strip_prefix(&root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                error!(posts_directory = %dir.display(), repo_root = %root.display(), "Posts directory outside repository");
                anyhow::bail!(
                    "Posts directory {} is not inside the repository {}",
                    dir.display(),
                    root.display()
                );
            }
        }
    } else {
        posts_directory.to_path_buf()
    };

    let full = repo_root.join(&relative);
    if !full.is_dir() {
        error!(posts_directory = %full.display(), "Posts directory does not exist");
        anyhow::bail!("Posts directory {} does not exist", full.display());
    }
    Ok(relative)
}
