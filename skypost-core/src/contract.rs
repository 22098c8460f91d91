//! # contract: shared types and collaborator traits for the post pipeline
//!
//! Everything the detector, classifier and publisher exchange lives here:
//! - [`AddedFile`] and [`PostVariant`], the values flowing through the pipeline
//! - [`PipelineError`], the single fatal error type; any variant aborts the whole run
//! - the collaborator traits [`GitRunner`], [`ImageFetcher`] and [`Publisher`]
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall`; mocks are exported with the
//!   `test-export-mocks` feature so the CLI crate and integration tests can use them.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;

/// Fatal pipeline failure. There is no recoverable variant: whoever receives one
/// stops the run and reports the message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("git: {0}")]
    Git(String),
    #[error("io: {0}")]
    Io(String),
    #[error("front matter: {0}")]
    FrontMatter(String),
    #[error("invalid post: {0}")]
    Validation(String),
    #[error("image: {0}")]
    Image(String),
    #[error("fetch: {0}")]
    Fetch(String),
    #[error("publish: {0}")]
    Publish(String),
}

/// A Markdown file reported as added by a git diff, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub path: PathBuf,
}

impl AddedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of the file, if it has one.
    pub fn suffix(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// A finished post, ready for exactly one publish call.
#[derive(Clone, PartialEq, Eq)]
pub enum PostVariant {
    Text {
        text: String,
    },
    Image {
        text: String,
        image_data: Vec<u8>,
        alt_text: String,
    },
    Card {
        text: String,
        image_data: Vec<u8>,
        card_title: String,
        card_description: String,
        card_uri: String,
    },
}

impl PostVariant {
    pub fn text(&self) -> &str {
        match self {
            PostVariant::Text { text }
            | PostVariant::Image { text, .. }
            | PostVariant::Card { text, .. } => text,
        }
    }

    /// Short name of the variant, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PostVariant::Text { .. } => "text-only post",
            PostVariant::Image { .. } => "post with image",
            PostVariant::Card { .. } => "post with card",
        }
    }
}

// Image payloads are summarised by size; dumping raw bytes makes reports unreadable.
impl fmt::Debug for PostVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostVariant::Text { text } => f.debug_struct("Text").field("text", text).finish(),
            PostVariant::Image {
                text,
                image_data,
                alt_text,
            } => f
                .debug_struct("Image")
                .field("text", text)
                .field("image_bytes", &image_data.len())
                .field("alt_text", alt_text)
                .finish(),
            PostVariant::Card {
                text,
                image_data,
                card_title,
                card_description,
                card_uri,
            } => f
                .debug_struct("Card")
                .field("text", text)
                .field("image_bytes", &image_data.len())
                .field("card_title", card_title)
                .field("card_description", card_description)
                .field("card_uri", card_uri)
                .finish(),
        }
    }
}

/// Link preview attached to a card post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCard {
    pub title: String,
    pub description: String,
    pub uri: String,
}

/// Raw response of an image download. Status checking is left to the caller.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedImage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Runs a git subcommand and returns its stdout.
///
/// Implementations must return [`PipelineError::Git`] when git cannot be started or
/// exits with a non-zero status; callers treat both as fatal.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait GitRunner {
    fn run(&self, args: &[String]) -> Result<String, PipelineError>;
}

/// Downloads a remote image.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Returns the response status and body; transport failures are [`PipelineError::Fetch`].
    async fn fetch(&self, url: &str) -> Result<FetchedImage, PipelineError>;
}

/// Error type returned by publishers (boxed, like the other network collaborators).
pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// One call per post variant on the social network.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a plain text post.
    async fn send_post(&self, text: &str) -> Result<(), PublishError>;

    /// Publish a post with a single attached image.
    async fn send_image(&self, text: &str, image: &[u8], alt: &str) -> Result<(), PublishError>;

    /// Publish a post with an external link card; `thumb` is the card thumbnail.
    async fn send_card(&self, text: &str, thumb: &[u8], card: &LinkCard)
        -> Result<(), PublishError>;
}
