//! Search-engine submission clients.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::error::{Result, ServiceError};
use super::http::{build_client, check_status};
use super::{Indexer, IndexingAck};
use crate::config::{IndexingConfig, IndexingEndpoint, IndexingKind};
use crate::sanitize;
use crate::secrets::resolve_secret;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexNowBody<'a> {
    host: &'a str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_location: Option<&'a str>,
    url_list: [&'a str; 1],
}

/// IndexNow protocol submission (Bing, Yandex, Seznam, ...).
pub struct IndexNowIndexer {
    name: String,
    client: Client,
    endpoint: String,
    key: SecretString,
    key_location: Option<String>,
}

impl IndexNowIndexer {
    pub fn new(
        name: &str,
        endpoint: &str,
        key: SecretString,
        key_location: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            client: build_client()?,
            endpoint: endpoint.to_string(),
            key,
            key_location,
        })
    }
}

#[async_trait]
impl Indexer for IndexNowIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, url: &str) -> Result<IndexingAck> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ServiceError::InvalidRequest(format!("bad article url: {}", e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ServiceError::InvalidRequest("article url has no host".to_string()))?;

        debug!(
            "Submitting to IndexNow endpoint {} ({})",
            self.name,
            sanitize::redact_url(&self.endpoint)
        );
        let body = IndexNowBody {
            host,
            key: self.key.expose_secret(),
            key_location: self.key_location.as_deref(),
            url_list: [url],
        };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let response = check_status(&self.name, response).await?;
        // IndexNow acknowledges with 200 (accepted) or 202 (key pending).
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(ServiceError::Status {
                service: self.name.clone(),
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(IndexingAck {
            status: status.as_u16(),
        })
    }
}

/// GET `endpoint?url=<article>` style ping.
pub struct PingIndexer {
    name: String,
    client: Client,
    endpoint: String,
}

impl PingIndexer {
    pub fn new(name: &str, endpoint: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            client: build_client()?,
            endpoint: endpoint.to_string(),
        })
    }

    fn ping_url(&self, url: &str) -> Result<url::Url> {
        let mut target = url::Url::parse(&self.endpoint)
            .map_err(|e| ServiceError::InvalidRequest(format!("bad ping endpoint: {}", e)))?;
        target.query_pairs_mut().append_pair("url", url);
        Ok(target)
    }
}

#[async_trait]
impl Indexer for PingIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, url: &str) -> Result<IndexingAck> {
        let target = self.ping_url(url)?;
        debug!(
            "Pinging {} ({})",
            self.name,
            sanitize::redact_url(target.as_str())
        );
        let response = self.client.get(target).send().await?;
        let response = check_status(&self.name, response).await?;
        Ok(IndexingAck {
            status: response.status().as_u16(),
        })
    }
}

fn build_indexer(endpoint: &IndexingEndpoint) -> Result<Arc<dyn Indexer>> {
    match endpoint.kind {
        IndexingKind::IndexNow => {
            let key = resolve_secret(
                endpoint.key.key.as_deref(),
                endpoint.key.key_file.as_deref(),
                endpoint.key.key_env.as_deref(),
            )?;
            Ok(Arc::new(IndexNowIndexer::new(
                &endpoint.name,
                &endpoint.url,
                key,
                endpoint.key_location.clone(),
            )?))
        }
        IndexingKind::Ping => Ok(Arc::new(PingIndexer::new(&endpoint.name, &endpoint.url)?)),
    }
}

/// One indexer per configured endpoint, in config order.
pub fn build_indexers(config: &IndexingConfig) -> Result<Vec<Arc<dyn Indexer>>> {
    config.endpoints.iter().map(build_indexer).collect()
}
