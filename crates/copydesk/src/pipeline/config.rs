use std::time::Duration;

use crate::config::{Config, SeoConfig, DEFAULT_LANGUAGES};

/// Site settings the SEO stage needs to build canonical URLs.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub base_url: String,
    pub article_path: String,
    pub site_name: Option<String>,
    pub source_language: String,
}

/// Indexing retry policy. Backoff doubles after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt` attempts so far.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor)
    }
}

pub struct PipelineConfig {
    pub site: SiteSettings,
    pub languages: Vec<String>,
    pub seo: SeoConfig,
    pub generation_timeout: Duration,
    pub translation_timeout: Duration,
    pub translation_concurrency: usize,
    pub indexing_timeout: Duration,
    pub indexing_retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            site: SiteSettings {
                base_url: config.site.base_url.clone(),
                article_path: config.site.article_path.clone(),
                site_name: config.site.site_name.clone(),
                source_language: config.site.source_language.clone(),
            },
            languages: config.languages.clone(),
            seo: config.seo.clone(),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            translation_timeout: Duration::from_secs(config.translation.timeout_secs),
            translation_concurrency: config
                .translation
                .max_concurrency
                .unwrap_or(config.languages.len())
                .max(1),
            indexing_timeout: Duration::from_secs(config.indexing.timeout_secs),
            indexing_retry: RetryPolicy {
                max_attempts: config.indexing.retry.max_attempts.max(1),
                backoff: Duration::from_millis(config.indexing.retry.backoff_ms),
            },
        }
    }

    /// Defaults for a site: ten target languages, default SEO limits and
    /// timeouts, one indexing attempt.
    pub fn for_site(base_url: &str) -> Self {
        Self {
            site: SiteSettings {
                base_url: base_url.to_string(),
                article_path: "articles".to_string(),
                site_name: None,
                source_language: "en".to_string(),
            },
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            seo: SeoConfig::default(),
            generation_timeout: Duration::from_secs(120),
            translation_timeout: Duration::from_secs(60),
            translation_concurrency: DEFAULT_LANGUAGES.len(),
            indexing_timeout: Duration::from_secs(15),
            indexing_retry: RetryPolicy::once(),
        }
    }
}
