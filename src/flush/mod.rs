//! Flush scheduling
//!
//! [`FlushPolicy`] is the pure decision (deadline or size, never empty);
//! [`FlushScheduler`] is the one long-lived loop that applies it to the
//! shared buffer and hands snapshots to the writer set.

pub mod policy;
pub mod scheduler;

pub use policy::FlushPolicy;
pub use scheduler::FlushScheduler;
