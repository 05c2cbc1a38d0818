//! Status text for hosts that display a session header

use crate::auth::UserIdentity;
use crate::schema::App;
use crate::session::{ConnectionState, SessionHandle};
use std::fmt;

/// Avatars shown before the rest collapse into an overflow list
pub const MAX_INLINE_AVATARS: usize = 3;

const DEFAULT_TITLE: &str = "Ready for vibe coding";

pub fn format_connection_state(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::EstablishingConnection => "connecting",
        ConnectionState::CatchingUp => "syncing",
    }
}

pub fn format_save_status(saved: bool) -> &'static str {
    if saved {
        "saved"
    } else {
        "not saved"
    }
}

/// Collaborators split into inline avatars and an overflow list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPartition {
    pub inline: Vec<UserIdentity>,
    pub overflow: Vec<UserIdentity>,
}

pub fn partition_roster(users: &[UserIdentity], max_inline: usize) -> RosterPartition {
    let split = users.len().min(max_inline);
    RosterPartition {
        inline: users[..split].to_vec(),
        overflow: users[split..].to_vec(),
    }
}

/// One-line session header: title, save status, connection status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    pub title: String,
    pub saved: bool,
    pub connection: ConnectionState,
}

impl SessionHeader {
    pub async fn from_session(handle: &SessionHandle<App>) -> Self {
        let title = handle.view().read().await.metadata.title.clone();
        let container = handle.container();
        Self {
            title: if title.trim().is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            },
            saved: !container.is_dirty(),
            connection: container.connection_state(),
        }
    }
}

impl fmt::Display for SessionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.title,
            format_save_status(self.saved),
            format_connection_state(self.connection)
        )
    }
}
