//! Fan-out writer set
//!
//! Owns the ordered list of destinations. A flush takes a snapshot of the
//! membership, spawns one delivery task per destination and waits for all of
//! them. Attach and detach only swap membership under the write lock, so an
//! in-flight flush keeps working on the list it started with.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::connector::{Connector, TcpConnector};
use super::entry::{DeliveryOutcome, WriterEntry};
use super::error::WriterError;

struct Slot<S> {
    addr: SocketAddr,
    entry: Arc<Mutex<WriterEntry<S>>>,
}

impl<S> Clone for Slot<S> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            entry: Arc::clone(&self.entry),
        }
    }
}

/// Per-destination results of one flush, in membership order
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    /// Snapshot size in bytes
    pub bytes: usize,
    /// One outcome per destination
    pub outcomes: Vec<(SocketAddr, DeliveryOutcome)>,
}

impl FlushReport {
    /// Number of destinations that received the snapshot
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_delivered())
            .count()
    }

    /// Outcome for one destination
    pub fn outcome(&self, addr: SocketAddr) -> Option<DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, outcome)| *outcome)
    }
}

/// Ordered set of downstream writers
pub struct WriterSet<C: Connector = TcpConnector> {
    connector: Arc<C>,
    retry_count: u32,
    slots: RwLock<Vec<Slot<C::Stream>>>,
}

impl<C: Connector> WriterSet<C> {
    /// Create an empty set
    pub fn new(connector: C, retry_count: u32) -> Self {
        Self {
            connector: Arc::new(connector),
            retry_count: retry_count.max(1),
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Create a set holding `destinations` in order
    ///
    /// A repeated address is logged and skipped; the first occurrence keeps
    /// its position.
    pub fn with_destinations<I>(connector: C, retry_count: u32, destinations: I) -> Self
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let mut slots: Vec<Slot<C::Stream>> = Vec::new();
        for addr in destinations {
            if slots.iter().any(|slot| slot.addr == addr) {
                tracing::warn!(addr = %addr, "Duplicate destination ignored");
                continue;
            }
            slots.push(Slot {
                addr,
                entry: Arc::new(Mutex::new(WriterEntry::new(addr))),
            });
        }

        Self {
            slots: RwLock::new(slots),
            ..Self::new(connector, retry_count)
        }
    }

    /// Connector used to dial destinations
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Append a destination; it is dialed on the next flush
    ///
    /// Entries are identified by socket address value, so the same address
    /// cannot be attached twice.
    pub async fn attach(&self, addr: SocketAddr) -> Result<(), WriterError> {
        let mut slots = self.slots.write().await;

        if slots.iter().any(|slot| slot.addr == addr) {
            return Err(WriterError::AlreadyAttached(addr));
        }

        slots.push(Slot {
            addr,
            entry: Arc::new(Mutex::new(WriterEntry::new(addr))),
        });
        tracing::debug!(addr = %addr, writers = slots.len(), "Writer attached");

        Ok(())
    }

    /// Remove the destination with this address and close its connection
    ///
    /// Returns `false` if no such destination was attached. If a flush is
    /// delivering to it, the close waits for that delivery to finish.
    pub async fn detach(&self, addr: SocketAddr) -> bool {
        let removed = {
            let mut slots = self.slots.write().await;
            match slots.iter().position(|slot| slot.addr == addr) {
                Some(index) => slots.remove(index),
                None => return false,
            }
        };

        removed.entry.lock().await.close().await;
        tracing::debug!(addr = %addr, "Writer detached");

        true
    }

    /// Current destinations in attach order
    pub async fn destinations(&self) -> Vec<SocketAddr> {
        self.slots.read().await.iter().map(|slot| slot.addr).collect()
    }

    /// Number of attached destinations
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Whether no destination is attached
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Deliver `data` to every destination in parallel and wait for all
    ///
    /// A failing destination never delays or affects the others beyond this
    /// final wait. Cancelling `cancel` abandons deliveries still in progress
    /// and drops their connections, since a partial write may have been sent.
    pub async fn flush(&self, data: Bytes, cancel: &CancellationToken) -> FlushReport {
        let slots = self.slots.read().await.clone();
        let mut tasks = JoinSet::new();

        for (index, slot) in slots.into_iter().enumerate() {
            let connector = Arc::clone(&self.connector);
            let data = data.clone();
            let cancel = cancel.clone();
            let retry_count = self.retry_count;

            tasks.spawn(async move {
                let mut entry = slot.entry.lock().await;
                let outcome = tokio::select! {
                    outcome = entry.deliver(&*connector, &data, retry_count) => outcome,
                    _ = cancel.cancelled() => DeliveryOutcome::Cancelled,
                };
                if outcome == DeliveryOutcome::Cancelled {
                    entry.discard();
                }
                (index, slot.addr, outcome)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "Delivery task failed"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);

        let report = FlushReport {
            bytes: data.len(),
            outcomes: results
                .into_iter()
                .map(|(_, addr, outcome)| (addr, outcome))
                .collect(),
        };

        tracing::info!(
            bytes = report.bytes,
            destinations = report.outcomes.len(),
            delivered = report.delivered(),
            "Flush completed"
        );

        report
    }

    /// Close every open destination connection; membership is kept
    pub async fn close_all(&self) {
        let slots = self.slots.read().await.clone();
        for slot in slots {
            slot.entry.lock().await.close().await;
        }
    }
}
