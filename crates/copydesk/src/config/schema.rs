use serde::{Deserialize, Serialize};

/// Target languages used when the config does not list any.
pub const DEFAULT_LANGUAGES: &[&str] = &["es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko", "ar"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    pub site: SiteConfig,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    pub generation: GenerationConfig,
    pub translation: TranslationConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub seo: SeoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_languages() -> Vec<String> {
    DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect()
}

fn default_broadcast_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public origin articles are published under, e.g. `https://example.com`.
    pub base_url: String,
    #[serde(default = "default_article_path")]
    pub article_path: String,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default = "default_source_language")]
    pub source_language: String,
}

fn default_article_path() -> String {
    "articles".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

/// Where an API key comes from. Resolved with [`crate::secrets::resolve_secret`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub endpoint: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(flatten)]
    pub credentials: ApiKeyConfig,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub endpoint: String,
    #[serde(flatten)]
    pub credentials: ApiKeyConfig,
    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,
    /// Upper bound on in-flight translation calls. Defaults to one per language.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn default_translation_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_indexing_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub endpoints: Vec<IndexingEndpoint>,
}

fn default_indexing_timeout() -> u64 {
    15
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_indexing_timeout(),
            retry: RetryConfig::default(),
            endpoints: Vec::new(),
        }
    }
}

/// Retry policy for indexing submissions. Backoff doubles after each attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingKind {
    /// IndexNow protocol: JSON POST with a site key.
    IndexNow,
    /// Plain GET ping with the URL as a query parameter.
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingEndpoint {
    pub name: String,
    pub kind: IndexingKind,
    pub url: String,
    #[serde(flatten)]
    pub key: IndexingKeyConfig,
    #[serde(default)]
    pub key_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingKeyConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoConfig {
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
    #[serde(default = "default_description_max_len")]
    pub description_max_len: usize,
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,
    #[serde(default = "default_excerpt_max_len")]
    pub excerpt_max_len: usize,
}

fn default_title_max_len() -> usize {
    60
}

fn default_description_max_len() -> usize {
    160
}

fn default_keyword_count() -> usize {
    8
}

fn default_excerpt_max_len() -> usize {
    200
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            title_max_len: default_title_max_len(),
            description_max_len: default_description_max_len(),
            keyword_count: default_keyword_count(),
            excerpt_max_len: default_excerpt_max_len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
