//! HTTP document service
//!
//! Talks to the local development service or the remote service over their
//! REST document API, authorizing each request with a bearer token from the
//! connection's credential provider.

use super::{DocumentRecord, DocumentService, SessionError};
use crate::auth::TokenProvider;
use crate::connection::ConnectionConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentPayload<'a> {
    schema_id: &'a str,
    root: Value,
}

#[derive(Serialize)]
struct SummaryPayload {
    root: Value,
}

pub struct HttpDocumentService {
    base_url: Url,
    tenant_id: String,
    token_provider: Arc<dyn TokenProvider>,
    client: Client,
}

impl std::fmt::Debug for HttpDocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDocumentService")
            .field("base_url", &self.base_url.as_str())
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl HttpDocumentService {
    /// Consume `config` and prepare a client for its service.
    ///
    /// A remote config carrying an insecure credential is refused.
    pub fn from_config(config: ConnectionConfig) -> Result<Self, SessionError> {
        if let ConnectionConfig::Remote(remote) = &config {
            if remote.token_provider.is_insecure() {
                return Err(SessionError::InsecureCredential(
                    remote.endpoint.to_string(),
                ));
            }
        }

        let base_url = config.endpoint().clone();
        if base_url.cannot_be_a_base() {
            return Err(SessionError::InvalidEndpoint(base_url.to_string()));
        }

        Ok(Self {
            tenant_id: config.tenant_id().to_string(),
            token_provider: Arc::clone(config.token_provider()),
            base_url,
            client: Client::new(),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// URL of `documents/{tenant}/{segments...}` under the service endpoint
    pub fn documents_url(&self, segments: &[&str]) -> Result<Url, SessionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SessionError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .push("documents")
            .push(&self.tenant_id)
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SessionError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SessionError::Service {
                status: status.as_u16(),
                body: body.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn create_document(&self, schema_id: &str, root: Value) -> Result<String, SessionError> {
        let token = self
            .token_provider
            .fetch_orderer_token(&self.tenant_id, None, false)
            .await?;

        let response = self
            .client
            .post(self.documents_url(&[])?)
            .bearer_auth(token.jwt)
            .json(&CreateDocumentPayload { schema_id, root })
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let id = response.json::<String>().await?;
        Ok(id)
    }

    async fn load_document(&self, id: &str) -> Result<DocumentRecord, SessionError> {
        let token = self
            .token_provider
            .fetch_storage_token(&self.tenant_id, id, false)
            .await?;

        let response = self
            .client
            .get(self.documents_url(&[id])?)
            .bearer_auth(token.jwt)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let record = response.json::<DocumentRecord>().await?;
        Ok(record)
    }

    async fn upload_summary(&self, id: &str, root: Value) -> Result<(), SessionError> {
        let token = self
            .token_provider
            .fetch_storage_token(&self.tenant_id, id, false)
            .await?;

        let response = self
            .client
            .put(self.documents_url(&[id, "summary"])?)
            .bearer_auth(token.jwt)
            .json(&SummaryPayload { root })
            .send()
            .await?;

        Self::ensure_success(response).await.map(|_| ())
    }
}
