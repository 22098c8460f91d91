//! Turns one added post file into a [`PostVariant`].
//!
//! The steps run in a fixed order and the first failure aborts the whole batch:
//! parse the file, validate the body, resolve and strip the optional image, then
//! pick the variant from the front matter shape in [`classify_document`].

use std::fs;
use std::path::Path;

use tracing::{debug, error, info};
use url::Url;

use crate::config::{Limits, PipelineConfig};
use crate::contract::{AddedFile, ImageFetcher, PipelineError, PostVariant};
use crate::front_matter::{load_document, ParsedDocument};
use crate::imaging::strip_metadata;

pub const IMAGE: &str = "image";
pub const ALT: &str = "alt";
pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const URI: &str = "uri";

/// Loads, validates and classifies a single post.
pub async fn prepare_post<F>(
    file: &AddedFile,
    config: &PipelineConfig,
    fetcher: &F,
) -> Result<PostVariant, PipelineError>
where
    F: ImageFetcher + ?Sized,
{
    let path = config.repo_root.join(file.path());
    info!(path = %path.display(), "Preparing post");

    let document = load_document(&path)?;
    validate_body(document.body(), &config.limits)?;

    let image = match document.text_field(IMAGE)? {
        Some(reference) => Some(load_image(&reference, &path, fetcher, &config.limits).await?),
        None => None,
    };

    let post = classify_document(&document, image)?;
    info!(path = %path.display(), kind = post.kind(), "Prepared post");
    Ok(post)
}

/// Rejects blank bodies and bodies longer than `max_post_length` characters.
pub fn validate_body(body: &str, limits: &Limits) -> Result<(), PipelineError> {
    if body.trim().is_empty() {
        error!("Post text is empty");
        return Err(PipelineError::Validation("Post text cannot be empty".into()));
    }

    let length = body.chars().count();
    if length > limits.max_post_length {
        error!(length, max = limits.max_post_length, "Post text too long");
        return Err(PipelineError::Validation(format!(
            "Post text exceeds {} characters ({length})",
            limits.max_post_length
        )));
    }
    Ok(())
}

/// Resolves an `image` reference (absolute http(s) URL, or a path relative to the post
/// file's directory) and returns the image with its metadata stripped.
pub async fn load_image<F>(
    reference: &str,
    post_path: &Path,
    fetcher: &F,
    limits: &Limits,
) -> Result<Vec<u8>, PipelineError>
where
    F: ImageFetcher + ?Sized,
{
    let raw = if is_remote(reference) {
        let fetched = fetcher.fetch(reference).await?;
        if !fetched.is_success() {
            error!(url = %reference, status = fetched.status, "Image download was not successful");
            return Err(PipelineError::Fetch(format!(
                "Failed to download image from {reference}: HTTP {}",
                fetched.status
            )));
        }
        fetched.body
    } else {
        let base = post_path.parent().unwrap_or_else(|| Path::new(""));
        let image_path = base.join(reference);
        if !image_path.exists() {
            error!(path = %image_path.display(), "Image file does not exist");
            return Err(PipelineError::Io(format!(
                "Image file {} does not exist",
                image_path.display()
            )));
        }
        debug!(path = %image_path.display(), "Reading local image");
        fs::read(&image_path).map_err(|e| {
            error!(error = ?e, path = %image_path.display(), "Failed to read image file");
            PipelineError::Io(format!("Failed to read {}: {e}", image_path.display()))
        })?
    };

    let stripped = strip_metadata(&raw)?;
    if stripped.len() > limits.max_image_bytes {
        error!(
            size = stripped.len(),
            max = limits.max_image_bytes,
            image = %reference,
            "Image too large"
        );
        return Err(PipelineError::Validation(format!(
            "Image file size exceeds {} bytes ({})",
            limits.max_image_bytes,
            stripped.len()
        )));
    }
    Ok(stripped)
}

fn is_remote(reference: &str) -> bool {
    Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Picks the variant for a parsed document. `image` must hold the stripped image
/// whenever the document has an `image` key.
///
/// First match wins: no metadata is a text post; `title`, `description`, `uri` and
/// `image` make a card; `image` with `alt` makes an image post. `image` without `alt`
/// and every other shape are rejected.
pub fn classify_document(
    document: &ParsedDocument,
    image: Option<Vec<u8>>,
) -> Result<PostVariant, PipelineError> {
    let text = document.body().to_string();

    if document.metadata().is_empty() {
        return Ok(PostVariant::Text { text });
    }

    if [TITLE, DESCRIPTION, URI, IMAGE].iter().all(|key| document.has(key)) {
        return Ok(PostVariant::Card {
            text,
            image_data: resolved(image)?,
            card_title: required_field(document, TITLE)?,
            card_description: required_field(document, DESCRIPTION)?,
            card_uri: required_field(document, URI)?,
        });
    }

    if document.has(IMAGE) && document.has(ALT) {
        return Ok(PostVariant::Image {
            text,
            image_data: resolved(image)?,
            alt_text: required_field(document, ALT)?,
        });
    }

    if document.has(IMAGE) {
        error!("Image without alt text");
        return Err(PipelineError::Validation(
            "Image alt text is required when an image is provided".into(),
        ));
    }

    let keys: Vec<&str> = document.metadata().keys().map(String::as_str).collect();
    error!(?keys, "Front matter matches no post shape");
    Err(PipelineError::Validation(format!(
        "unsupported front matter keys [{}]: expected `image` with `alt`, \
         or `title`, `description`, `uri` and `image`",
        keys.join(", ")
    )))
}

fn resolved(image: Option<Vec<u8>>) -> Result<Vec<u8>, PipelineError> {
    image.ok_or_else(|| PipelineError::Validation("`image` was not resolved before classification".into()))
}

fn required_field(document: &ParsedDocument, key: &str) -> Result<String, PipelineError> {
    document
        .text_field(key)?
        .ok_or_else(|| PipelineError::Validation(format!("missing front matter field `{key}`")))
}
