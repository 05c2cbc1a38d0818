//! Session bootstrapper
//!
//! Opens a connection to the service described by a [`ConnectionConfig`],
//! creates a new shared session seeded from an initial-state factory or
//! attaches to an existing one, and hands back a [`SessionHandle`].
//!
//! Connection failures are returned to the caller as-is: nothing here
//! retries or times out. Dropping the future abandons the attempt.

mod container;
mod http;

pub use container::{ConnectionState, Container, ContainerEvent, EventSubscription};
pub use http::HttpDocumentService;

use crate::auth::TokenError;
use crate::connection::ConnectionConfig;
use crate::schema::{SchemaDescriptor, SchemaError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Error types for opening and using a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to acquire token: {0}")]
    Token(#[from] TokenError),
    #[error("Document service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Document service error {status}: {body}")]
    Service { status: u16, body: String },
    #[error("Root state does not match schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("Document uses schema {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },
    #[error("Failed to convert root state: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Refusing insecure credential for remote endpoint {0}")]
    InsecureCredential(String),
    #[error("Endpoint cannot hold document paths: {0}")]
    InvalidEndpoint(String),
    #[error("Session has been disposed")]
    Disposed,
}

/// Whether to start a new session or join an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    Create,
    Attach(String),
}

impl SessionTarget {
    /// `Attach` for a non-empty id, `Create` otherwise
    pub fn from_id(id: Option<String>) -> Self {
        match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => SessionTarget::Attach(id.trim().to_string()),
            None => SessionTarget::Create,
        }
    }
}

/// Stored document as returned by a document service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub schema_id: String,
    pub root: Value,
}

/// Storage and sequencing service backing sessions
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create a document seeded with `root`; returns its id
    async fn create_document(&self, schema_id: &str, root: Value) -> Result<String, SessionError>;

    async fn load_document(&self, id: &str) -> Result<DocumentRecord, SessionError>;

    /// Persist the current root of document `id`
    async fn upload_summary(&self, id: &str, root: Value) -> Result<(), SessionError>;
}

/// Typed view over the root of a session
pub struct TreeView<S> {
    root: Arc<RwLock<S>>,
    container: Container,
}

impl<S> Clone for TreeView<S> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            container: self.container.clone(),
        }
    }
}

impl<S> TreeView<S> {
    fn new(root: S, container: Container) -> Self {
        Self {
            root: Arc::new(RwLock::new(root)),
            container,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, S> {
        self.root.read().await
    }

    pub async fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.root.read().await.clone()
    }

    /// Apply a local change to the root and mark the container dirty
    pub async fn edit<F, R>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut S) -> R,
    {
        if self.container.is_disposed() {
            return Err(SessionError::Disposed);
        }

        let mut root = self.root.write().await;
        let result = f(&mut root);
        self.container.mark_dirty();
        Ok(result)
    }
}

/// Handle to an open session: the connection object and the typed root
pub struct SessionHandle<S> {
    container: Container,
    view: TreeView<S>,
    service: Arc<dyn DocumentService>,
}

impl<S> SessionHandle<S> {
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn view(&self) -> &TreeView<S> {
        &self.view
    }

    pub fn container_id(&self) -> &str {
        self.container.id()
    }

    pub fn dispose(&self) {
        self.container.dispose();
    }
}

impl<S: Serialize> SessionHandle<S> {
    /// Upload the current root and mark the container saved
    pub async fn save(&self) -> Result<(), SessionError> {
        if self.container.is_disposed() {
            return Err(SessionError::Disposed);
        }

        // Hold the read guard so no edit lands between upload and mark_saved
        let root = self.view.read().await;
        let value = serde_json::to_value(&*root)?;
        self.service
            .upload_summary(self.container.id(), value)
            .await?;
        self.container.mark_saved();
        Ok(())
    }
}

/// Open a session against the service described by `config`.
///
/// `config` is consumed; see [`bootstrap_with`] for the create/attach rules.
pub async fn bootstrap<S, F>(
    config: ConnectionConfig,
    initial_state: F,
    schema: &SchemaDescriptor,
    target: SessionTarget,
) -> Result<SessionHandle<S>, SessionError>
where
    S: Serialize + DeserializeOwned,
    F: FnOnce() -> S,
{
    let service = HttpDocumentService::from_config(config)?;
    bootstrap_with(Arc::new(service), initial_state, schema, target).await
}

/// Open a session on an explicit document service.
///
/// For [`SessionTarget::Create`] the root is seeded with `initial_state()`,
/// checked against `schema` and uploaded. For [`SessionTarget::Attach`] the
/// stored root is loaded and checked instead; `initial_state` is not called.
/// The handle is returned once the container reports `Connected`.
pub async fn bootstrap_with<S, F>(
    service: Arc<dyn DocumentService>,
    initial_state: F,
    schema: &SchemaDescriptor,
    target: SessionTarget,
) -> Result<SessionHandle<S>, SessionError>
where
    S: Serialize + DeserializeOwned,
    F: FnOnce() -> S,
{
    let (id, root) = match target {
        SessionTarget::Create => {
            let root = initial_state();
            let value = serde_json::to_value(&root)?;
            schema.validate_root(&value)?;

            let id = service.create_document(&schema.id, value).await?;
            tracing::info!(container_id = %id, schema_id = %schema.id, "Created session");
            (id, root)
        }
        SessionTarget::Attach(id) => {
            let record = service.load_document(&id).await?;
            if record.schema_id != schema.id {
                return Err(SessionError::SchemaMismatch {
                    expected: schema.id.clone(),
                    found: record.schema_id,
                });
            }
            schema.validate_root(&record.root)?;

            let root: S = serde_json::from_value(record.root)?;
            tracing::info!(container_id = %record.id, schema_id = %schema.id, "Attached to session");
            (record.id, root)
        }
    };

    let container = Container::new(id);
    for state in [
        ConnectionState::EstablishingConnection,
        ConnectionState::CatchingUp,
        ConnectionState::Connected,
    ] {
        container.set_connection_state(state);
    }

    Ok(SessionHandle {
        view: TreeView::new(root, container.clone()),
        container,
        service,
    })
}
