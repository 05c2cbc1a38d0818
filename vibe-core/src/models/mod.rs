//! Data models for vibe

pub mod configuration;

pub use configuration::*;
