//! Observability setup for Tenantgate: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
