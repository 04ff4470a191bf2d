//! Remote registry access: template fetch and sandbox publish.
//!
//! The resolver and pipeline talk to the registry through the
//! [`SandboxRegistry`] trait so tests can substitute a mock; the production
//! implementation is [`HttpRegistry`] over the CodeSandbox HTTP API:
//!
//! - `GET  {base}/api/v1/sandboxes/{id}` - raw template JSON, wrapped in a
//!   `data` envelope
//! - `POST {base}/api/v1/sandboxes/define` - publish a file set, returns
//!   the new sandbox id
//!
//! No retries, backoff, or authentication: a failed request surfaces as
//! [`SandboxError::TemplateFetch`] or [`SandboxError::Publish`] for the
//! single code block being processed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Result, SandboxError};
use crate::template::{RawTemplate, TemplateFiles};

/// The outbound interface to the sandbox registry.
#[async_trait]
pub trait SandboxRegistry: Send + Sync {
    /// Fetch the raw template for a sandbox id.
    async fn fetch_template(&self, id: &str) -> Result<RawTemplate>;

    /// Publish a file set as a new sandbox, returning its id.
    async fn define_sandbox(&self, files: &TemplateFiles) -> Result<String>;
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Serialize)]
struct DefineRequest<'a> {
    files: &'a TemplateFiles,
    json: u8,
}

#[derive(Deserialize)]
struct DefineResponse {
    sandbox_id: String,
}

/// Registry client over the CodeSandbox HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    /// Create a client for the given base URL, e.g.
    /// `https://codesandbox.io`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }
}

#[async_trait]
impl SandboxRegistry for HttpRegistry {
    async fn fetch_template(&self, id: &str) -> Result<RawTemplate> {
        let url = self.api_url(&format!("sandboxes/{id}"));
        debug!(template = id, %url, "fetching template");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SandboxError::TemplateFetch {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SandboxError::TemplateFetch {
                id: id.to_string(),
                reason: format!("registry returned {status}"),
            });
        }

        let envelope: DataEnvelope<RawTemplate> =
            response
                .json()
                .await
                .map_err(|e| SandboxError::TemplateInvalid {
                    id: id.to_string(),
                    reason: format!("malformed registry response: {e}"),
                })?;

        Ok(envelope.data)
    }

    async fn define_sandbox(&self, files: &TemplateFiles) -> Result<String> {
        let url = self.api_url("sandboxes/define");
        debug!(file_count = files.len(), %url, "publishing sandbox");

        let response = self
            .client
            .post(&url)
            .json(&DefineRequest { files, json: 1 })
            .send()
            .await
            .map_err(|e| SandboxError::Publish {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SandboxError::Publish {
                reason: format!("define endpoint returned {status}"),
            });
        }

        let defined: DefineResponse =
            response.json().await.map_err(|e| SandboxError::Publish {
                reason: format!("malformed define response: {e}"),
            })?;

        debug!(sandbox_id = %defined.sandbox_id, "sandbox published");
        Ok(defined.sandbox_id)
    }
}
