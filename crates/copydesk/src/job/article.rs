//! Article value objects produced by the generation and SEO stages.

use serde::{Deserialize, Serialize};

/// Raw draft as returned by the generation collaborator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "image")]
    pub image_ref: Option<String>,
}

/// Search metadata derived from the article by the optimization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoMetadata {
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: Vec<String>,
    pub slug: String,
    pub canonical_url: String,
    /// schema.org `Article` JSON-LD.
    pub structured_data: serde_json::Value,
}

/// A validated, generated article. Body text is fixed once generation
/// completes; only `seo` is filled in afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoMetadata>,
}

impl Article {
    pub fn seo_title(&self) -> Option<&str> {
        self.seo.as_ref().map(|s| s.seo_title.as_str())
    }

    pub fn seo_description(&self) -> Option<&str> {
        self.seo.as_ref().map(|s| s.seo_description.as_str())
    }

    pub fn seo_keywords(&self) -> &[String] {
        self.seo
            .as_ref()
            .map(|s| s.seo_keywords.as_slice())
            .unwrap_or(&[])
    }

    pub fn canonical_url(&self) -> Option<&str> {
        self.seo.as_ref().map(|s| s.canonical_url.as_str())
    }
}

/// Translated rendition of an article for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedContent {
    pub title: String,
    pub excerpt: String,
    pub body: String,
}
