//! # Vibe Core Library
//!
//! Client bootstrap for collaborative sessions: probe the environment, pick
//! the local or remote service, build connection parameters and open a typed
//! session for the presentation layer.
//!
//! ```text
//! environment::probe → mode::select_mode → connection::build_config → session::bootstrap
//! ```
//!
//! [`startup::StartupFlow`] runs these steps as a one-shot state machine.

pub mod auth;
pub mod connection;
pub mod environment;
pub mod mode;
pub mod models;
pub mod schema;
pub mod services;
pub mod session;
pub mod startup;
pub mod status;
