//! Downstream fan-out
//!
//! Every flush hands the same snapshot to each destination. Destinations
//! are independent: each keeps its own lazily dialed connection and its own
//! retry budget, and one failing destination never holds back another.
//!
//! ```text
//!                 WriterSet::flush(snapshot)
//!                          │
//!        ┌─────────────────┼─────────────────┐
//!        ▼                 ▼                 ▼
//!   [task: D1]        [task: D2]        [task: D3]
//!   dial? write       dial? write       dial? write
//!   retry ≤ N         retry ≤ N         retry ≤ N
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!                join all → FlushReport
//! ```
//!
//! `Bytes` is reference counted, so the snapshot is shared by all tasks
//! rather than copied per destination.

pub mod connector;
pub mod entry;
pub mod error;
pub mod set;

#[cfg(test)]
pub(crate) mod mock;

pub use connector::{Connector, TcpConnector};
pub use entry::{DeliveryOutcome, WriterEntry};
pub use error::WriterError;
pub use set::{FlushReport, WriterSet};
