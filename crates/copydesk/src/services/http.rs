//! JSON-over-HTTP generation and translation clients.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::error::{Result, ServiceError};
use super::{Generator, TranslationRequest, Translator};
use crate::config::{ApiKeyConfig, GenerationConfig, TranslationConfig};
use crate::job::{ArticleDraft, TranslatedContent};
use crate::pipeline::GenerationRequest;
use crate::sanitize;
use crate::secrets::resolve_secret_optional;

/// Maximum length of an error body carried into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("copydesk/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn resolve_api_key(credentials: &ApiKeyConfig) -> Result<Option<SecretString>> {
    Ok(resolve_secret_optional(
        credentials.api_key.as_deref(),
        credentials.api_key_file.as_deref(),
        credentials.api_key_env.as_deref(),
    )?)
}

fn with_auth(request: RequestBuilder, api_key: Option<&SecretString>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key.expose_secret()),
        None => request,
    }
}

/// Turns non-2xx responses into [`ServiceError::Status`] with a truncated body.
pub(crate) async fn check_status(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        service: service.to_string(),
        status: status.as_u16(),
        body: sanitize::truncate_for_log(body.trim(), MAX_ERROR_BODY_LENGTH),
    })
}

// ─── Generation ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(flatten)]
    request: &'a GenerationRequest,
}

pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    model: Option<String>,
    api_key: Option<SecretString>,
}

impl HttpGenerator {
    pub fn new(endpoint: &str, model: Option<String>, api_key: Option<SecretString>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.to_string(),
            model,
            api_key,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.credentials)?;
        Self::new(&config.endpoint, config.model.clone(), api_key)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ArticleDraft> {
        debug!(
            "Requesting article from {} ({} input)",
            sanitize::redact_url(&self.endpoint),
            request.source_type
        );
        let body = GenerateBody {
            model: self.model.as_deref(),
            request,
        };
        let response = with_auth(self.client.post(&self.endpoint), self.api_key.as_ref())
            .json(&body)
            .send()
            .await?;
        let response = check_status("generation", response).await?;

        response
            .json::<ArticleDraft>()
            .await
            .map_err(|e| ServiceError::Decode {
                service: "generation".to_string(),
                reason: e.to_string(),
            })
    }
}

// ─── Translation ────────────────────────────────────────────────────────────

pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, api_key: Option<SecretString>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let api_key = resolve_api_key(&config.credentials)?;
        Self::new(&config.endpoint, api_key)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslatedContent> {
        debug!(
            "Requesting {} translation from {}",
            request.target_language,
            sanitize::redact_url(&self.endpoint)
        );
        let response = with_auth(self.client.post(&self.endpoint), self.api_key.as_ref())
            .json(request)
            .send()
            .await?;
        let response = check_status("translation", response).await?;

        response
            .json::<TranslatedContent>()
            .await
            .map_err(|e| ServiceError::Decode {
                service: "translation".to_string(),
                reason: e.to_string(),
            })
    }
}
