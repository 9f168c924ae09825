//! HTTP request handlers.
//!
//! Every handler except `/health` takes a [`TenantSession`] and so acts on
//! exactly one tenant.
//!
//! [`TenantSession`]: crate::http::extractors::auth::TenantSession

pub mod command;
pub mod info;
pub mod message;
pub mod webhook;
