use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::error::GenerationError;
use super::normalize::GenerationRequest;
use super::seo::{collapse_whitespace, cap_on_word_boundary, leading_sentences};
use crate::job::{Article, ArticleDraft};
use crate::services::Generator;

const DEFAULT_CATEGORY: &str = "general";

/// Calls the generation collaborator once, under a timeout, and validates
/// the draft it returns.
pub struct GenerationStage {
    generator: Arc<dyn Generator>,
    timeout: Duration,
    excerpt_max_len: usize,
}

impl GenerationStage {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration, excerpt_max_len: usize) -> Self {
        Self {
            generator,
            timeout,
            excerpt_max_len,
        }
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<Article, GenerationError> {
        let draft = tokio::time::timeout(self.timeout, self.generator.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;
        debug!(
            "Draft received: title {} chars, body {} chars, {} tag(s)",
            draft.title.chars().count(),
            draft.body.chars().count(),
            draft.tags.len()
        );
        validate_draft(draft, self.excerpt_max_len)
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = collapse_whitespace(&tag).to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Turns a raw draft into an [`Article`]: title and body are required, the
/// excerpt is derived from the body when missing, tags are normalized and
/// the category falls back to `general`.
pub fn validate_draft(
    draft: ArticleDraft,
    excerpt_max_len: usize,
) -> Result<Article, GenerationError> {
    let title = collapse_whitespace(&draft.title);
    if title.is_empty() {
        return Err(GenerationError::MissingTitle);
    }
    let body = draft.body.trim().to_string();
    if body.is_empty() {
        return Err(GenerationError::MissingBody);
    }

    let excerpt = match draft.excerpt.as_deref().map(collapse_whitespace) {
        Some(excerpt) if !excerpt.is_empty() => {
            cap_on_word_boundary(&excerpt, excerpt_max_len, true)
        }
        _ => leading_sentences(&body, excerpt_max_len),
    };
    let category = draft
        .category
        .as_deref()
        .map(collapse_whitespace)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let image_ref = draft
        .image_ref
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty());

    Ok(Article {
        title,
        body,
        excerpt,
        category,
        tags: normalize_tags(draft.tags),
        image_ref,
        seo: None,
    })
}
