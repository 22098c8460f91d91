//! Splits a post file into its YAML front matter and Markdown body.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, error};

use crate::contract::PipelineError;

pub type Metadata = BTreeMap<String, Value>;

/// Body text and front matter of one post file. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    body: String,
    metadata: Metadata,
}

impl ParsedDocument {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn has(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// A scalar front matter value rendered as text.
    ///
    /// Strings, numbers and booleans are accepted; null, lists and maps are rejected.
    pub fn text_field(&self, key: &str) -> Result<Option<String>, PipelineError> {
        match self.metadata.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(PipelineError::Validation(format!(
                "front matter field `{key}` must be a string, got {other:?}"
            ))),
        }
    }
}

fn boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"(?m)^-{3,}[ \t]*\r?$").expect("valid boundary regex"))
}

/// Reads and parses a post file.
pub fn load_document(path: &Path) -> Result<ParsedDocument, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to read post file");
        PipelineError::Io(format!("Failed to read {}: {e}", path.display()))
    })?;
    let document = parse_document(&raw).map_err(|e| match e {
        PipelineError::FrontMatter(msg) => {
            PipelineError::FrontMatter(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    debug!(
        path = %path.display(),
        body_chars = document.body.chars().count(),
        metadata_keys = ?document.metadata.keys().collect::<Vec<_>>(),
        "Parsed post file"
    );
    Ok(document)
}

/// Parses post text. Without an opening and a closing `---` line the whole text is the
/// body and the metadata is empty; both parts are trimmed.
pub fn parse_document(raw: &str) -> Result<ParsedDocument, PipelineError> {
    let text = raw.trim();

    let opens_with_boundary = boundary().find(text).is_some_and(|m| m.start() == 0);
    if !opens_with_boundary {
        return Ok(bare(text));
    }

    let mut parts = boundary().splitn(text, 3);
    parts.next();
    let (Some(header), Some(body)) = (parts.next(), parts.next()) else {
        return Ok(bare(text));
    };

    Ok(ParsedDocument {
        body: body.trim().to_string(),
        metadata: parse_metadata(header)?,
    })
}

fn bare(text: &str) -> ParsedDocument {
    ParsedDocument {
        body: text.to_string(),
        metadata: Metadata::new(),
    }
}

fn parse_metadata(header: &str) -> Result<Metadata, PipelineError> {
    if header.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: Value = serde_yaml::from_str(header)
        .map_err(|e| PipelineError::FrontMatter(format!("malformed YAML header: {e}")))?;

    match value {
        Value::Null => Ok(Metadata::new()),
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, value)| match key {
                Value::String(key) => Ok((key, value)),
                other => Err(PipelineError::FrontMatter(format!(
                    "header keys must be strings, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(PipelineError::FrontMatter(format!(
            "header must be a mapping of keys to values, got {other:?}"
        ))),
    }
}
