//! Infrastructure layer for Tenantgate.
//!
//! Contains implementations of the ports defined in `tenantgate-core`:
//! the reqwest-based webhook sender (with HMAC-SHA256 signing), the
//! in-process loopback transport, and the TOML/env configuration loader.

pub mod config;
pub mod transport;
pub mod webhook;
