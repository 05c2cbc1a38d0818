//! Credential providers
//!
//! A token provider produces the bearer token a document service expects.
//! The insecure provider signs tokens locally with a shared key and is only
//! good for the development service; the function provider asks a remote
//! token-issuing service.

use super::UserIdentity;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of locally signed tokens
pub const TOKEN_LIFETIME_SECS: i64 = 60 * 60;

const TOKEN_VERSION: &str = "1.0";
const SCOPES: [&str; 3] = ["doc:read", "doc:write", "summary:write"];

/// Error types for token acquisition
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing or verification failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token service error {status}: {body}")]
    Service { status: u16, body: String },
    #[error("Token service returned an empty token")]
    EmptyToken,
}

/// Token handed to a document service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub jwt: String,
}

/// Produces access tokens on demand
#[async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    /// Token for creating or joining a document's op stream.
    ///
    /// `document_id` is `None` while a new document is being created.
    async fn fetch_orderer_token(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
        refresh: bool,
    ) -> Result<TokenResponse, TokenError>;

    /// Token for reading and writing document storage
    async fn fetch_storage_token(
        &self,
        tenant_id: &str,
        document_id: &str,
        refresh: bool,
    ) -> Result<TokenResponse, TokenError>;

    /// True for providers that must never authorize a production connection
    fn is_insecure(&self) -> bool {
        false
    }
}

/// Claims carried by locally signed tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub document_id: String,
    pub scopes: Vec<String>,
    pub tenant_id: String,
    pub user: UserIdentity,
    pub iat: i64,
    pub exp: i64,
    pub ver: String,
    pub jti: String,
}

/// Development-only provider that signs tokens with a shared key.
///
/// Reports itself as insecure so a remote connection refuses it.
pub struct InsecureTokenProvider {
    key: String,
    user: UserIdentity,
}

impl std::fmt::Debug for InsecureTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsecureTokenProvider")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl InsecureTokenProvider {
    pub fn new(key: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            key: key.into(),
            user,
        }
    }

    fn sign(&self, tenant_id: &str, document_id: Option<&str>) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            document_id: document_id.unwrap_or_default().to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            tenant_id: tenant_id.to_string(),
            user: self.user.clone(),
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
            ver: TOKEN_VERSION.to_string(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.key.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode a token signed with this provider's key
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.key.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}

#[async_trait]
impl TokenProvider for InsecureTokenProvider {
    async fn fetch_orderer_token(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
        _refresh: bool,
    ) -> Result<TokenResponse, TokenError> {
        Ok(TokenResponse {
            jwt: self.sign(tenant_id, document_id)?,
        })
    }

    async fn fetch_storage_token(
        &self,
        tenant_id: &str,
        document_id: &str,
        _refresh: bool,
    ) -> Result<TokenResponse, TokenError> {
        Ok(TokenResponse {
            jwt: self.sign(tenant_id, Some(document_id))?,
        })
    }

    fn is_insecure(&self) -> bool {
        true
    }
}

/// Provider that defers to a remote token-issuing function
#[derive(Debug, Clone)]
pub struct FunctionTokenProvider {
    url: String,
    user: UserIdentity,
    client: Client,
}

impl FunctionTokenProvider {
    pub fn new(url: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            url: url.into(),
            user,
            client: Client::new(),
        }
    }

    async fn request_token(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
    ) -> Result<String, TokenError> {
        let mut params = vec![("tenantId", tenant_id.to_string())];
        if let Some(document_id) = document_id {
            params.push(("documentId", document_id.to_string()));
        }
        params.push(("userName", self.user.name.clone()));
        params.push(("userId", self.user.id.clone()));

        tracing::debug!(url = %self.url, tenant_id, ?document_id, "Requesting token");

        let response = self.client.get(&self.url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Service {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let token = response.text().await?.trim().to_string();
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for FunctionTokenProvider {
    async fn fetch_orderer_token(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
        _refresh: bool,
    ) -> Result<TokenResponse, TokenError> {
        Ok(TokenResponse {
            jwt: self.request_token(tenant_id, document_id).await?,
        })
    }

    async fn fetch_storage_token(
        &self,
        tenant_id: &str,
        document_id: &str,
        _refresh: bool,
    ) -> Result<TokenResponse, TokenError> {
        Ok(TokenResponse {
            jwt: self.request_token(tenant_id, Some(document_id)).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insecure_token_round_trips_claims() {
        let user = UserIdentity::new("u-1", "Ada");
        let provider = InsecureTokenProvider::new("VALUE_NOT_USED", user.clone());

        let token = provider
            .fetch_storage_token("local", "doc-1", false)
            .await
            .unwrap();
        let claims = provider.verify(&token.jwt).unwrap();

        assert_eq!(claims.tenant_id, "local");
        assert_eq!(claims.document_id, "doc-1");
        assert_eq!(claims.user, user);
        assert_eq!(claims.ver, "1.0");
        assert_eq!(claims.exp - claims.iat, TOKEN_LIFETIME_SECS);
        assert!(claims.scopes.contains(&"summary:write".to_string()));
    }

    #[tokio::test]
    async fn test_insecure_orderer_token_without_document() {
        let provider = InsecureTokenProvider::new("key", UserIdentity::local_default());
        let token = provider
            .fetch_orderer_token("local", None, false)
            .await
            .unwrap();
        assert_eq!(provider.verify(&token.jwt).unwrap().document_id, "");
    }

    #[tokio::test]
    async fn test_token_from_other_key_is_rejected() {
        let signer = InsecureTokenProvider::new("key-a", UserIdentity::local_default());
        let verifier = InsecureTokenProvider::new("key-b", UserIdentity::local_default());
        let token = signer
            .fetch_orderer_token("local", None, false)
            .await
            .unwrap();
        assert!(matches!(
            verifier.verify(&token.jwt),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn test_insecure_flag() {
        let insecure = InsecureTokenProvider::new("key", UserIdentity::local_default());
        let remote = FunctionTokenProvider::new(
            "https://tokens.example.com/api/GetToken",
            UserIdentity::remote_default(),
        );
        assert!(insecure.is_insecure());
        assert!(!remote.is_insecure());
    }

    #[test]
    fn test_insecure_debug_hides_key() {
        let provider = InsecureTokenProvider::new("super-secret", UserIdentity::new("u", "n"));
        assert!(!format!("{:?}", provider).contains("super-secret"));
    }
}
