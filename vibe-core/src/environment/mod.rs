//! Environment probe
//!
//! Captures the process configuration that decides between the local
//! development service and the remote service. The snapshot is taken once at
//! startup and passed explicitly to every later step.

use serde::Serialize;
use std::env;
use std::fmt;

/// Variable naming the requested client (`local` or anything else).
pub const FLUID_CLIENT_VAR: &str = "FLUID_CLIENT";

/// Configuration values that must all be present for the remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RemoteKey {
    ClientId,
    RedirectUri,
    TenantId,
    FunctionTokenProviderUrl,
    Orderer,
}

impl RemoteKey {
    /// Every required key, in declaration order
    pub const ALL: [RemoteKey; 5] = [
        RemoteKey::ClientId,
        RemoteKey::RedirectUri,
        RemoteKey::TenantId,
        RemoteKey::FunctionTokenProviderUrl,
        RemoteKey::Orderer,
    ];

    /// Name of the environment variable backing this key
    pub fn var_name(self) -> &'static str {
        match self {
            RemoteKey::ClientId => "AZURE_CLIENT_ID",
            RemoteKey::RedirectUri => "AZURE_REDIRECT_URI",
            RemoteKey::TenantId => "AZURE_TENANT_ID",
            RemoteKey::FunctionTokenProviderUrl => "AZURE_FUNCTION_TOKEN_PROVIDER_URL",
            RemoteKey::Orderer => "AZURE_ORDERER",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.var_name())
    }
}

/// Settings handed to the identity library for interactive sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub tenant_id: String,
}

/// Immutable capture of the startup environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    remote: [Option<String>; 5],
    requested_client: Option<String>,
}

/// Capture the current process environment.
///
/// Never fails: unset or non-unicode variables are recorded as absent.
pub fn probe() -> EnvironmentSnapshot {
    EnvironmentSnapshot::from_lookup(|name| env::var(name).ok())
}

impl EnvironmentSnapshot {
    /// Build a snapshot from an arbitrary variable lookup
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut remote: [Option<String>; 5] = Default::default();
        for key in RemoteKey::ALL {
            remote[key.index()] = lookup(key.var_name());
        }

        Self {
            remote,
            requested_client: lookup(FLUID_CLIENT_VAR),
        }
    }

    /// Raw value for `key`, possibly empty
    pub fn get(&self, key: RemoteKey) -> Option<&str> {
        self.remote[key.index()].as_deref()
    }

    /// True when `key` has a non-empty value
    pub fn is_present(&self, key: RemoteKey) -> bool {
        self.get(key).is_some_and(|value| !value.is_empty())
    }

    pub fn all_present(&self) -> bool {
        RemoteKey::ALL.iter().all(|key| self.is_present(*key))
    }

    /// Keys that are unset or empty, in `RemoteKey::ALL` order
    pub fn missing_keys(&self) -> Vec<RemoteKey> {
        RemoteKey::ALL
            .into_iter()
            .filter(|key| !self.is_present(*key))
            .collect()
    }

    /// Value of `FLUID_CLIENT` (or the fallback given to `with_requested_client`)
    pub fn requested_client(&self) -> Option<&str> {
        self.requested_client.as_deref()
    }

    /// Use `requested` as the requested client unless `FLUID_CLIENT` has a value.
    ///
    /// The environment variable takes precedence over command-line flags.
    /// An empty `FLUID_CLIENT` counts as unset.
    pub fn with_requested_client(mut self, requested: Option<String>) -> Self {
        if self.requested_client.as_deref().map_or(true, str::is_empty) {
            self.requested_client = requested;
        }
        self
    }

    /// Sign-in settings, if the three identity values are present
    pub fn auth_settings(&self) -> Option<AuthSettings> {
        let value = |key| {
            self.is_present(key)
                .then(|| self.get(key).unwrap_or_default().to_string())
        };

        Some(AuthSettings {
            client_id: value(RemoteKey::ClientId)?,
            redirect_uri: value(RemoteKey::RedirectUri)?,
            tenant_id: value(RemoteKey::TenantId)?,
        })
    }
}
