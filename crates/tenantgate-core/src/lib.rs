//! Session registry and lifecycle/event core for Tenantgate.
//!
//! This crate owns the per-tenant runtime: the token -> session table, each
//! session's connect/disconnect state machine, its message cache and toggle
//! flags, and the webhook fan-out path. The messaging protocol itself and the
//! HTTP client used for webhook delivery are "ports" (traits) implemented in
//! `tenantgate-infra`. It depends only on `tenantgate-types` -- never on
//! `tenantgate-infra` or any network crate.

pub mod access;
pub mod cache;
pub mod command;
pub mod registry;
pub mod session;
pub mod sink;
pub mod toggle;
pub mod transport;
pub mod webhook;

#[cfg(test)]
mod testing;
