//! Transport port: how a session obtains a live protocol connection.
//!
//! The wire protocol (pairing, encryption, encoding) is out of scope for the
//! core. A [`TransportConnector`] establishes a [`TransportLink`] for a token
//! and pushes events into the session through [`crate::sink::EventSink`].

pub mod box_connector;
pub mod connector;

pub use box_connector::BoxTransportConnector;
pub use connector::{TransportConnector, TransportLink};
