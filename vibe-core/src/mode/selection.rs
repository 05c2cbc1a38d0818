//! Mode selection
//!
//! Pure decision over the requested client and the environment snapshot.
//! Logging the fallback warning is left to the caller.

use super::{ClientMode, ModeSelection};
use crate::environment::EnvironmentSnapshot;

/// Requested-client value that forces the local service
pub const LOCAL_CLIENT: &str = "local";

/// Select the effective client mode.
///
/// # Behavior
/// 1. Local when `requested` is exactly `"local"` or any required key is missing
/// 2. Remote otherwise
/// 3. `fell_back` is set only when the local service was chosen because the
///    environment was incomplete and local was not explicitly requested
pub fn select_mode(requested: Option<&str>, snapshot: &EnvironmentSnapshot) -> ModeSelection {
    let missing = snapshot.missing_keys();
    let all_present = missing.is_empty();
    let local_requested = requested == Some(LOCAL_CLIENT);

    if local_requested || !all_present {
        let fell_back = !local_requested && !all_present;
        ModeSelection::new(ClientMode::Local, fell_back, missing)
    } else {
        ModeSelection::new(ClientMode::Remote, false, missing)
    }
}
