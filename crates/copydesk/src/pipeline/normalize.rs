//! Input normalization: merges text, attached files, a source URL and a video
//! reference into a single generation request. No I/O.

use std::collections::HashSet;
use std::fmt::Write;

use serde::Serialize;
use tracing::warn;

use super::error::InvalidInputError;
use crate::job::{FileDescriptor, SourceContent, SourceType};
use crate::sanitize;

/// What the generation collaborator receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub source_type: SourceType,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl GenerationRequest {
    /// One-line summary for the job log.
    pub fn describe(&self) -> String {
        let mut line = format!(
            "normalized {} input: {} chars, {} attached file(s)",
            self.source_type,
            self.text.chars().count(),
            self.files.len()
        );
        if let Some(url) = &self.source_url {
            let _ = write!(line, ", source url {}", sanitize::redact_url(url));
        }
        if let Some(video) = &self.video {
            let _ = write!(line, ", video {}", sanitize::truncate_for_log(video, 80));
        }
        line
    }
}

/// Collapses runs of whitespace inside paragraphs and keeps a single blank
/// line between paragraphs.
fn normalize_text(text: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        current.extend(line.split_whitespace());
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs.join("\n\n")
}

fn normalize_files(files: &[FileDescriptor]) -> Result<Vec<FileDescriptor>, InvalidInputError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let id = file.id.trim();
        if id.is_empty() {
            return Err(InvalidInputError::InvalidFile { index });
        }
        if !seen.insert(id.to_string()) {
            continue;
        }
        out.push(FileDescriptor {
            id: id.to_string(),
            name: file.name.trim().to_string(),
            mime_type: file.mime_type.clone(),
            size: file.size,
        });
    }
    Ok(out)
}

fn parse_http_url(raw: &str) -> Result<String, InvalidInputError> {
    let parsed = url::Url::parse(raw).map_err(|e| InvalidInputError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InvalidInputError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(parsed.to_string())
}

/// A video reference is either an http(s) link or a bare platform id.
fn normalize_video(raw: &str) -> Result<String, InvalidInputError> {
    if raw.contains("://") {
        return parse_http_url(raw);
    }
    let is_id = raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !is_id {
        return Err(InvalidInputError::InvalidUrl {
            url: raw.to_string(),
            reason: "not a URL or video id".to_string(),
        });
    }
    Ok(raw.to_string())
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Validates an optional reference. A malformed value is fatal only when it
/// is the declared input; otherwise it is dropped.
fn reference(
    raw: Option<&String>,
    declared: bool,
    kind: &str,
    parse: fn(&str) -> Result<String, InvalidInputError>,
) -> Result<Option<String>, InvalidInputError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    match parse(raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) if declared => Err(e),
        Err(_) => {
            warn!("Ignoring malformed {} hint", kind);
            Ok(None)
        }
    }
}

/// Builds the generation request for `source_type`, failing when the
/// payload has nothing usable for that type.
pub fn normalize(
    source_type: SourceType,
    content: &SourceContent,
) -> Result<GenerationRequest, InvalidInputError> {
    let text = normalize_text(&content.text);
    let files = normalize_files(&content.files)?;
    let source_url = reference(
        content.url.as_ref(),
        source_type == SourceType::Url,
        "source url",
        parse_http_url,
    )?;
    let video = reference(
        content.video.as_ref(),
        source_type == SourceType::Video,
        "video",
        normalize_video,
    )?;

    let has_content = match source_type {
        SourceType::Text => !text.is_empty(),
        SourceType::File => !files.is_empty() || !text.is_empty(),
        SourceType::Url => source_url.is_some(),
        SourceType::Video => video.is_some(),
    };
    if !has_content {
        return Err(InvalidInputError::Empty(source_type));
    }

    Ok(GenerationRequest {
        source_type,
        text,
        files,
        source_url,
        video,
    })
}
