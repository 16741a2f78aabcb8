pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApiKeyConfig, Config, GenerationConfig, IndexingConfig, IndexingEndpoint, IndexingKeyConfig,
    IndexingKind, LogFormat, LoggingConfig, RetryConfig, SeoConfig, SiteConfig,
    TranslationConfig, DEFAULT_LANGUAGES,
};
