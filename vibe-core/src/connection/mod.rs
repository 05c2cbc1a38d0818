//! Connection config builder
//!
//! Turns the selected mode into the parameters needed to open a session:
//! the service endpoint, the tenant, and the credential provider.

use crate::auth::{FunctionTokenProvider, InsecureTokenProvider, TokenProvider, UserIdentity};
use crate::environment::{EnvironmentSnapshot, RemoteKey};
use crate::mode::ClientMode;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Fixed endpoint of the development service
pub const LOCAL_ENDPOINT: &str = "http://localhost:7070";

/// Tenant used by the development service
pub const LOCAL_TENANT_ID: &str = "local";

/// Signing key of the development credential; it protects nothing
pub const INSECURE_TOKEN_KEY: &str = "VALUE_NOT_USED";

/// Error types for config building
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Remote config requested without required environment: {}", join_keys(.missing))]
    IncompleteRemoteEnvironment { missing: Vec<RemoteKey> },
    #[error("Invalid URL in {key}: {value}")]
    InvalidUrl { key: RemoteKey, value: String },
}

fn join_keys(keys: &[RemoteKey]) -> String {
    keys.iter()
        .map(|key| key.var_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parameters for the development service
#[derive(Debug, Clone)]
pub struct LocalConnectionConfig {
    pub endpoint: Url,
    pub token_provider: Arc<dyn TokenProvider>,
    pub user: UserIdentity,
}

/// Parameters for the remote service
#[derive(Debug, Clone)]
pub struct RemoteConnectionConfig {
    pub endpoint: Url,
    pub tenant_id: String,
    pub token_provider: Arc<dyn TokenProvider>,
    pub user: UserIdentity,
}

/// Connection parameters, one variant per client mode
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    Local(LocalConnectionConfig),
    Remote(RemoteConnectionConfig),
}

impl ConnectionConfig {
    pub fn mode(&self) -> ClientMode {
        match self {
            ConnectionConfig::Local(_) => ClientMode::Local,
            ConnectionConfig::Remote(_) => ClientMode::Remote,
        }
    }

    pub fn endpoint(&self) -> &Url {
        match self {
            ConnectionConfig::Local(config) => &config.endpoint,
            ConnectionConfig::Remote(config) => &config.endpoint,
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            ConnectionConfig::Local(_) => LOCAL_TENANT_ID,
            ConnectionConfig::Remote(config) => &config.tenant_id,
        }
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        match self {
            ConnectionConfig::Local(config) => &config.token_provider,
            ConnectionConfig::Remote(config) => &config.token_provider,
        }
    }

    pub fn user(&self) -> &UserIdentity {
        match self {
            ConnectionConfig::Local(config) => &config.user,
            ConnectionConfig::Remote(config) => &config.user,
        }
    }
}

/// Build connection parameters for `mode`.
///
/// The local variant never reads `snapshot`. The remote variant requires
/// every remote key; a missing one means the mode selector was bypassed and
/// is reported as [`ConfigError::IncompleteRemoteEnvironment`].
pub fn build_config(
    mode: ClientMode,
    snapshot: &EnvironmentSnapshot,
    identity: Option<UserIdentity>,
) -> Result<ConnectionConfig, ConfigError> {
    match mode {
        ClientMode::Local => Ok(ConnectionConfig::Local(local_config(identity))),
        ClientMode::Remote => remote_config(snapshot, identity).map(ConnectionConfig::Remote),
    }
}

fn local_config(identity: Option<UserIdentity>) -> LocalConnectionConfig {
    let user = identity.unwrap_or_else(UserIdentity::local_default);
    let token_provider: Arc<dyn TokenProvider> =
        Arc::new(InsecureTokenProvider::new(INSECURE_TOKEN_KEY, user.clone()));

    LocalConnectionConfig {
        endpoint: local_endpoint(),
        token_provider,
        user,
    }
}

fn local_endpoint() -> Url {
    match Url::parse(LOCAL_ENDPOINT) {
        Ok(url) => url,
        Err(e) => unreachable!("LOCAL_ENDPOINT is a valid URL: {}", e),
    }
}

fn remote_config(
    snapshot: &EnvironmentSnapshot,
    identity: Option<UserIdentity>,
) -> Result<RemoteConnectionConfig, ConfigError> {
    let missing = snapshot.missing_keys();
    if !missing.is_empty() {
        return Err(ConfigError::IncompleteRemoteEnvironment { missing });
    }

    let endpoint = parse_url(snapshot, RemoteKey::Orderer)?;
    let token_url = parse_url(snapshot, RemoteKey::FunctionTokenProviderUrl)?;
    let tenant_id = snapshot
        .get(RemoteKey::TenantId)
        .unwrap_or_default()
        .to_string();

    let user = identity.unwrap_or_else(UserIdentity::remote_default);
    let token_provider: Arc<dyn TokenProvider> =
        Arc::new(FunctionTokenProvider::new(token_url, user.clone()));

    Ok(RemoteConnectionConfig {
        endpoint,
        tenant_id,
        token_provider,
        user,
    })
}

fn parse_url(snapshot: &EnvironmentSnapshot, key: RemoteKey) -> Result<Url, ConfigError> {
    let value = snapshot.get(key).unwrap_or_default();
    Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

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
            ("AZURE_TENANT_ID", "tenant-42"),
            (
                "AZURE_FUNCTION_TOKEN_PROVIDER_URL",
                "https://tokens.example.com/api/GetToken",
            ),
            ("AZURE_ORDERER", "https://us.fluidrelay.example.com"),
        ]
    }

    #[test]
    fn test_local_config_uses_fixed_endpoint() {
        // Remote values are present but must be ignored
        let config = build_config(ClientMode::Local, &snapshot(&remote_vars()), None).unwrap();

        assert_eq!(config.mode(), ClientMode::Local);
        assert_eq!(config.endpoint().as_str(), "http://localhost:7070/");
        assert_eq!(config.tenant_id(), LOCAL_TENANT_ID);
        assert!(config.token_provider().is_insecure());
        assert_eq!(config.user().name, "Local developer");
    }

    #[test]
    fn test_local_config_keeps_supplied_identity() {
        let user = UserIdentity::new("u-7", "Grace");
        let config = build_config(ClientMode::Local, &snapshot(&[]), Some(user.clone())).unwrap();
        assert_eq!(config.user(), &user);
    }

    #[test]
    fn test_remote_config_reads_environment() {
        let user = UserIdentity::new("u-1", "Ada");
        let config =
            build_config(ClientMode::Remote, &snapshot(&remote_vars()), Some(user.clone()))
                .unwrap();

        assert_eq!(config.mode(), ClientMode::Remote);
        assert_eq!(
            config.endpoint().as_str(),
            "https://us.fluidrelay.example.com/"
        );
        assert_eq!(config.tenant_id(), "tenant-42");
        assert!(!config.token_provider().is_insecure());
        assert_eq!(config.user(), &user);
    }

    #[test]
    fn test_remote_config_binds_provider_to_identity() {
        let user = UserIdentity::new("u-1", "Ada");
        let config =
            build_config(ClientMode::Remote, &snapshot(&remote_vars()), Some(user)).unwrap();
        let debug = format!("{:?}", config.token_provider());
        assert!(debug.contains("tokens.example.com"));
        assert!(debug.contains("Ada"));
    }

    #[test]
    fn test_remote_config_defaults_identity() {
        let config = build_config(ClientMode::Remote, &snapshot(&remote_vars()), None).unwrap();
        assert_eq!(config.user().name, "Anonymous collaborator");
    }

    #[test]
    fn test_remote_config_without_environment_fails() {
        let mut vars = remote_vars();
        vars.retain(|(k, _)| *k != "AZURE_ORDERER");
        let err = build_config(ClientMode::Remote, &snapshot(&vars), None).unwrap_err();

        match err {
            ConfigError::IncompleteRemoteEnvironment { missing } => {
                assert_eq!(missing, vec![RemoteKey::Orderer]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_remote_config_rejects_relative_endpoint() {
        let mut vars = remote_vars();
        vars.retain(|(k, _)| *k != "AZURE_ORDERER");
        vars.push(("AZURE_ORDERER", "not a url"));
        let err = build_config(ClientMode::Remote, &snapshot(&vars), None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                key: RemoteKey::Orderer,
                ..
            }
        ));
    }

    #[test]
    fn test_incomplete_error_names_variables() {
        let err = ConfigError::IncompleteRemoteEnvironment {
            missing: vec![RemoteKey::TenantId, RemoteKey::Orderer],
        };
        assert_eq!(
            err.to_string(),
            "Remote config requested without required environment: AZURE_TENANT_ID, AZURE_ORDERER"
        );
    }
}
