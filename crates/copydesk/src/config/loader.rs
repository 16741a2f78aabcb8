use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::schema::{Config, IndexingKind};
use crate::error::ConfigError;
use crate::secrets::has_secret_source;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

static RE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").unwrap());

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    validate_http_url("site.base_url", &config.site.base_url)?;
    validate_http_url("generation.endpoint", &config.generation.endpoint)?;
    validate_http_url("translation.endpoint", &config.translation.endpoint)?;

    // Languages
    let mut seen = HashSet::new();
    for code in &config.languages {
        if !RE_LANGUAGE.is_match(code) {
            return Err(ConfigError::InvalidLanguage {
                code: code.clone(),
                reason: "not a lowercase language code".to_string(),
            });
        }
        if code == &config.site.source_language {
            return Err(ConfigError::InvalidLanguage {
                code: code.clone(),
                reason: "target language equals the source language".to_string(),
            });
        }
        if !seen.insert(code) {
            return Err(ConfigError::InvalidLanguage {
                code: code.clone(),
                reason: "listed more than once".to_string(),
            });
        }
    }

    if config.translation.max_concurrency == Some(0) {
        return Err(ConfigError::Validation {
            message: "translation.max_concurrency must be at least 1".to_string(),
        });
    }

    // Indexing endpoints
    let mut names = HashSet::new();
    for endpoint in &config.indexing.endpoints {
        if !names.insert(&endpoint.name) {
            return Err(ConfigError::InvalidEndpoint {
                name: endpoint.name.clone(),
                reason: "duplicate endpoint name".to_string(),
            });
        }
        validate_http_url(&format!("indexing.endpoints.{}", endpoint.name), &endpoint.url)?;
        if endpoint.kind == IndexingKind::IndexNow
            && !has_secret_source(
                endpoint.key.key.as_deref(),
                endpoint.key.key_file.as_deref(),
                endpoint.key.key_env.as_deref(),
            )
        {
            return Err(ConfigError::InvalidEndpoint {
                name: endpoint.name.clone(),
                reason: "IndexNow endpoints need one of key, key_file or key_env".to_string(),
            });
        }
    }

    if config.indexing.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "indexing.retry.max_attempts must be at least 1".to_string(),
        });
    }

    Ok(())
}
