//! tcp-duplicator
//!
//! Accepts a single logical byte stream over TCP, splits it on the zero
//! byte, accumulates the frames in a shared buffer and periodically copies
//! the buffered bytes verbatim to every configured downstream destination.
//!
//! # Data flow
//!
//! ```text
//!  inbound conns ──► ingest::read_frames ──► SharedBuffer::append
//!                                                   │
//!                         FlushScheduler tick ◄─────┘
//!                                 │ snapshot_and_clear
//!                                 ▼
//!                          WriterSet::flush ──► D1, D2, ... Dn
//! ```
//!
//! Delivery is at-most-once per flush: a destination that exhausts its
//! retry budget drops that snapshot and starts fresh on the next flush.

pub mod buffer;
pub mod config;
pub mod error;
pub mod flush;
pub mod ingest;
pub mod server;
pub mod writer;

pub use buffer::SharedBuffer;
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use server::Relay;
