//! Shared domain types for Tenantgate.
//!
//! This crate contains the domain types used across the gateway: session
//! tokens and lifecycle states, cached chat messages, toggle flags, webhook
//! targets and payloads, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, sha2.

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod toggle;
pub mod webhook;
