//! HTTP layer for the gateway.
//!
//! Axum router mounted under each route alias (`/`, `/current`, `/v4`),
//! token or system-credential session resolution, and the envelope
//! response format.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
