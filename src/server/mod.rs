//! Relay server
//!
//! Wires ingestion, the shared buffer, the flush scheduler and the writer
//! set together behind [`Relay`].

pub mod listener;

pub use listener::Relay;
