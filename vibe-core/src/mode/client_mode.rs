//! Client mode and the result of selecting one

use crate::environment::RemoteKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which service the session connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// Development service on the loopback interface
    Local,
    /// Cloud-hosted service
    Remote,
}

impl fmt::Display for ClientMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMode::Local => f.write_str("local"),
            ClientMode::Remote => f.write_str("remote"),
        }
    }
}

/// Outcome of mode selection
///
/// Computed once per process; never updated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSelection {
    /// Effective mode
    pub mode: ClientMode,
    /// Remote was implied but the environment was incomplete
    pub fell_back: bool,
    /// Required keys that were unset or empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<RemoteKey>,
    /// Timestamp when mode was determined
    pub determined_at: DateTime<Utc>,
}

impl ModeSelection {
    pub fn new(mode: ClientMode, fell_back: bool, missing: Vec<RemoteKey>) -> Self {
        Self {
            mode,
            fell_back,
            missing,
            determined_at: Utc::now(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.mode == ClientMode::Local
    }

    pub fn is_remote(&self) -> bool {
        self.mode == ClientMode::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_mode_display() {
        assert_eq!(ClientMode::Local.to_string(), "local");
        assert_eq!(ClientMode::Remote.to_string(), "remote");
    }

    #[test]
    fn test_selection_serializes_lowercase_mode() {
        let selection = ModeSelection::new(ClientMode::Local, true, vec![RemoteKey::Orderer]);
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["mode"], "local");
        assert_eq!(json["fell_back"], true);
        assert_eq!(json["missing"][0], "Orderer");
    }

    #[test]
    fn test_selection_predicates() {
        let remote = ModeSelection::new(ClientMode::Remote, false, Vec::new());
        assert!(remote.is_remote());
        assert!(!remote.is_local());
    }
}
