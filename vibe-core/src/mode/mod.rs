//! Client mode selection
//!
//! Decides whether the session connects to the local development service or
//! to the remote service, based on the requested client and the captured
//! environment.

mod client_mode;
mod selection;

pub use client_mode::{ClientMode, ModeSelection};
pub use selection::{select_mode, LOCAL_CLIENT};
