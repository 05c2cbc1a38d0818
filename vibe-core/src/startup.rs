//! Startup flow
//!
//! Drives the one-shot bootstrap sequence of a process:
//! `Init → ModeSelected → ConfigReady → Connected`, or `Failed` from either
//! of the last two steps. There is no way back from `Connected` or `Failed`.

use crate::auth::UserIdentity;
use crate::connection::{self, ConfigError, ConnectionConfig};
use crate::environment::EnvironmentSnapshot;
use crate::mode::{self, ModeSelection};
use crate::schema::SchemaDescriptor;
use crate::session::{self, DocumentService, SessionError, SessionHandle, SessionTarget};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Phase of the startup flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    Init,
    ModeSelected,
    ConfigReady,
    Connected,
    Failed,
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapPhase::Init => "init",
            BootstrapPhase::ModeSelected => "mode_selected",
            BootstrapPhase::ConfigReady => "config_ready",
            BootstrapPhase::Connected => "connected",
            BootstrapPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Error types for the startup flow
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Startup step requires phase {expected}, flow is in {actual}")]
    OutOfOrder {
        expected: BootstrapPhase,
        actual: BootstrapPhase,
    },
    #[error("Invalid connection configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to open session: {0}")]
    Session(#[from] SessionError),
}

/// One-shot startup state machine
#[derive(Debug)]
pub struct StartupFlow {
    snapshot: EnvironmentSnapshot,
    phase: BootstrapPhase,
    selection: Option<ModeSelection>,
    config: Option<ConnectionConfig>,
}

impl StartupFlow {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            snapshot,
            phase: BootstrapPhase::Init,
            selection: None,
            config: None,
        }
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    pub fn snapshot(&self) -> &EnvironmentSnapshot {
        &self.snapshot
    }

    /// Mode chosen by [`StartupFlow::select_mode`], once it has run
    pub fn selection(&self) -> Option<&ModeSelection> {
        self.selection.as_ref()
    }

    fn expect_phase(&self, expected: BootstrapPhase) -> Result<(), StartupError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(StartupError::OutOfOrder {
                expected,
                actual: self.phase,
            })
        }
    }

    fn advance(&mut self, next: BootstrapPhase) {
        tracing::debug!(from = %self.phase, to = %next, "Startup phase changed");
        self.phase = next;
    }

    /// Choose the client mode from the snapshot's requested client.
    ///
    /// Emits a single warning when remote was implied but the environment
    /// was incomplete.
    pub fn select_mode(&mut self) -> Result<ModeSelection, StartupError> {
        self.expect_phase(BootstrapPhase::Init)?;

        let selection = mode::select_mode(self.snapshot.requested_client(), &self.snapshot);
        if selection.fell_back {
            let missing: Vec<&str> = selection.missing.iter().map(|k| k.var_name()).collect();
            tracing::warn!(
                missing = %missing.join(","),
                "Missing remote configuration detected. Falling back to local client."
            );
        }
        tracing::info!(mode = %selection.mode, "Client mode selected");

        self.selection = Some(selection.clone());
        self.advance(BootstrapPhase::ModeSelected);
        Ok(selection)
    }

    /// Build the connection config for the selected mode
    pub fn build_config(&mut self, identity: Option<UserIdentity>) -> Result<(), StartupError> {
        self.expect_phase(BootstrapPhase::ModeSelected)?;
        let mode = match &self.selection {
            Some(selection) => selection.mode,
            None => {
                return Err(StartupError::OutOfOrder {
                    expected: BootstrapPhase::ModeSelected,
                    actual: self.phase,
                })
            }
        };

        match connection::build_config(mode, &self.snapshot, identity) {
            Ok(config) => {
                tracing::info!(endpoint = %config.endpoint(), tenant_id = config.tenant_id(), "Connection config ready");
                self.config = Some(config);
                self.advance(BootstrapPhase::ConfigReady);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Connection config failed");
                self.advance(BootstrapPhase::Failed);
                Err(e.into())
            }
        }
    }

    fn take_config(&mut self) -> Result<ConnectionConfig, StartupError> {
        self.expect_phase(BootstrapPhase::ConfigReady)?;
        self.config.take().ok_or(StartupError::OutOfOrder {
            expected: BootstrapPhase::ConfigReady,
            actual: self.phase,
        })
    }

    /// Open the session over HTTP using the prepared config
    pub async fn connect<S, F>(
        &mut self,
        initial_state: F,
        schema: &SchemaDescriptor,
        target: SessionTarget,
    ) -> Result<SessionHandle<S>, StartupError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce() -> S,
    {
        let config = self.take_config()?;
        let result = session::bootstrap(config, initial_state, schema, target).await;
        self.finish(result)
    }

    /// Open the session on an explicit document service.
    ///
    /// The prepared config is consumed and discarded.
    pub async fn connect_with<S, F>(
        &mut self,
        service: Arc<dyn DocumentService>,
        initial_state: F,
        schema: &SchemaDescriptor,
        target: SessionTarget,
    ) -> Result<SessionHandle<S>, StartupError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce() -> S,
    {
        self.take_config()?;
        let result = session::bootstrap_with(service, initial_state, schema, target).await;
        self.finish(result)
    }

    fn finish<S>(
        &mut self,
        result: Result<SessionHandle<S>, SessionError>,
    ) -> Result<SessionHandle<S>, StartupError> {
        match result {
            Ok(handle) => {
                self.advance(BootstrapPhase::Connected);
                Ok(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "Session bootstrap failed");
                self.advance(BootstrapPhase::Failed);
                Err(e.into())
            }
        }
    }
}

/// Run the whole startup flow against the configured service
pub async fn run<S, F>(
    snapshot: EnvironmentSnapshot,
    identity: Option<UserIdentity>,
    initial_state: F,
    schema: &SchemaDescriptor,
    target: SessionTarget,
) -> Result<SessionHandle<S>, StartupError>
where
    S: Serialize + DeserializeOwned,
    F: FnOnce() -> S,
{
    let mut flow = StartupFlow::new(snapshot);
    flow.select_mode()?;
    flow.build_config(identity)?;
    flow.connect(initial_state, schema, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RemoteKey;
    use crate::mode::ClientMode;
    use crate::schema::{app_schema, create_initial_app_state, App};
    use crate::session::DocumentRecord;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings<F: FnOnce()>(f: F) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    fn snapshot(vars: &[(&str, &str)]) -> EnvironmentSnapshot {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvironmentSnapshot::from_lookup(|name| vars.get(name).cloned())
    }

    fn remote_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_REDIRECT_URI", "http://localhost:8080"),
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_FUNCTION_TOKEN_PROVIDER_URL", "https://tokens.example.com/api"),
            ("AZURE_ORDERER", "https://orderer.example.com"),
        ]
    }

    struct Unreachable;

    #[async_trait]
    impl DocumentService for Unreachable {
        async fn create_document(&self, _: &str, _: Value) -> Result<String, SessionError> {
            Err(SessionError::Service {
                status: 502,
                body: "bad gateway".to_string(),
            })
        }

        async fn load_document(&self, _: &str) -> Result<DocumentRecord, SessionError> {
            Err(SessionError::Service {
                status: 502,
                body: "bad gateway".to_string(),
            })
        }

        async fn upload_summary(&self, _: &str, _: Value) -> Result<(), SessionError> {
            Ok(())
        }
    }

    struct Accepting;

    #[async_trait]
    impl DocumentService for Accepting {
        async fn create_document(&self, _: &str, _: Value) -> Result<String, SessionError> {
            Ok("doc-new".to_string())
        }

        async fn load_document(&self, id: &str) -> Result<DocumentRecord, SessionError> {
            Err(SessionError::Service {
                status: 404,
                body: id.to_string(),
            })
        }

        async fn upload_summary(&self, _: &str, _: Value) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[test]
    fn test_no_remote_env_falls_back_with_one_warning() {
        let mut flow = StartupFlow::new(snapshot(&[]));
        let warnings = count_warnings(|| {
            let selection = flow.select_mode().unwrap();
            assert_eq!(selection.mode, ClientMode::Local);
            assert!(selection.fell_back);
        });

        assert_eq!(warnings, 1);
        assert_eq!(flow.phase(), BootstrapPhase::ModeSelected);
    }

    #[test]
    fn test_explicit_local_does_not_warn() {
        let mut flow = StartupFlow::new(snapshot(&[("FLUID_CLIENT", "local")]));
        let warnings = count_warnings(|| {
            let selection = flow.select_mode().unwrap();
            assert_eq!(selection.mode, ClientMode::Local);
            assert!(!selection.fell_back);
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn test_complete_env_selects_remote() {
        let mut flow = StartupFlow::new(snapshot(&remote_vars()));
        let warnings = count_warnings(|| {
            let selection = flow.select_mode().unwrap();
            assert_eq!(selection.mode, ClientMode::Remote);
            assert!(!selection.fell_back);
        });
        assert_eq!(warnings, 0);

        flow.build_config(None).unwrap();
        assert_eq!(flow.phase(), BootstrapPhase::ConfigReady);
    }

    #[test]
    fn test_missing_orderer_with_azure_request_falls_back() {
        let mut vars = remote_vars();
        vars.retain(|(k, _)| *k != "AZURE_ORDERER");
        vars.push(("FLUID_CLIENT", "azure"));

        let mut flow = StartupFlow::new(snapshot(&vars));
        let selection = flow.select_mode().unwrap();
        assert_eq!(selection.mode, ClientMode::Local);
        assert!(selection.fell_back);
        assert_eq!(selection.missing, vec![RemoteKey::Orderer]);
    }

    #[test]
    fn test_steps_out_of_order_are_rejected() {
        let mut flow = StartupFlow::new(snapshot(&[]));
        assert!(matches!(
            flow.build_config(None),
            Err(StartupError::OutOfOrder {
                expected: BootstrapPhase::ModeSelected,
                actual: BootstrapPhase::Init,
            })
        ));

        flow.select_mode().unwrap();
        assert!(matches!(
            flow.select_mode(),
            Err(StartupError::OutOfOrder { .. })
        ));
        assert_eq!(flow.phase(), BootstrapPhase::ModeSelected);
    }

    #[tokio::test]
    async fn test_connect_failure_is_terminal() {
        let mut flow = StartupFlow::new(snapshot(&[("FLUID_CLIENT", "local")]));
        flow.select_mode().unwrap();
        flow.build_config(None).unwrap();

        let result: Result<SessionHandle<App>, _> = flow
            .connect_with(
                Arc::new(Unreachable),
                create_initial_app_state,
                &app_schema(),
                SessionTarget::Create,
            )
            .await;

        assert!(matches!(
            result,
            Err(StartupError::Session(SessionError::Service { status: 502, .. }))
        ));
        assert_eq!(flow.phase(), BootstrapPhase::Failed);

        let retry: Result<SessionHandle<App>, _> = flow
            .connect_with(
                Arc::new(Accepting),
                create_initial_app_state,
                &app_schema(),
                SessionTarget::Create,
            )
            .await;
        assert!(matches!(retry, Err(StartupError::OutOfOrder { .. })));
    }

    #[tokio::test]
    async fn test_local_flow_reaches_connected_with_initial_state() {
        let mut flow = StartupFlow::new(snapshot(&[]));
        flow.select_mode().unwrap();
        flow.build_config(None).unwrap();

        let handle: SessionHandle<App> = flow
            .connect_with(
                Arc::new(Accepting),
                create_initial_app_state,
                &app_schema(),
                SessionTarget::Create,
            )
            .await
            .unwrap();

        assert_eq!(flow.phase(), BootstrapPhase::Connected);
        assert_eq!(handle.container_id(), "doc-new");
        assert_eq!(handle.view().snapshot().await, create_initial_app_state());
    }
}
