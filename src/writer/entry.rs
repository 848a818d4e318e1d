//! One downstream destination and its connection

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::connector::Connector;

/// Result of delivering one snapshot to one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The full snapshot was written
    Delivered { attempts: u32 },
    /// The initial dial failed; nothing was written
    DialFailed,
    /// Every attempt in the budget failed, either writing or redialing
    Exhausted { attempts: u32 },
    /// Shutdown interrupted the delivery
    Cancelled,
}

impl DeliveryOutcome {
    /// Whether the snapshot reached the destination
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Destination address plus its lazily opened connection
///
/// `conn` is `None` until the first flush dials, and again after a failed
/// write discards the stream.
#[derive(Debug)]
pub struct WriterEntry<S> {
    addr: SocketAddr,
    conn: Option<S>,
}

impl<S> WriterEntry<S>
where
    S: AsyncWrite + Unpin + Send,
{
    /// Create an entry; nothing is dialed yet
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, conn: None }
    }

    /// Destination address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Deliver `data` with at most `retry_count` attempts
    ///
    /// Dials first if no connection is open; a failed first dial gives up
    /// immediately. A failed write drops the stream and the next attempt
    /// redials; a failed redial spends that attempt. When the budget runs
    /// out the snapshot is dropped for this destination and the entry is
    /// left disconnected.
    pub async fn deliver<C>(&mut self, connector: &C, data: &Bytes, retry_count: u32) -> DeliveryOutcome
    where
        C: Connector<Stream = S>,
    {
        for attempt in 1..=retry_count {
            if self.conn.is_none() && !self.dial(connector).await && attempt == 1 {
                return DeliveryOutcome::DialFailed;
            }

            let conn = match self.conn.as_mut() {
                Some(conn) => conn,
                None => continue,
            };

            match write_snapshot(conn, data).await {
                Ok(()) => {
                    tracing::debug!(
                        addr = %self.addr,
                        bytes = data.len(),
                        attempt = attempt,
                        "Snapshot delivered"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    tracing::warn!(
                        addr = %self.addr,
                        attempt = attempt,
                        retry_count = retry_count,
                        error = %e,
                        "Write to destination failed"
                    );
                    self.conn = None;
                }
            }
        }

        tracing::warn!(
            addr = %self.addr,
            bytes = data.len(),
            retry_count = retry_count,
            "Retry budget exhausted, snapshot dropped for destination"
        );
        DeliveryOutcome::Exhausted {
            attempts: retry_count,
        }
    }

    /// Drop the connection without a shutdown handshake
    pub fn discard(&mut self) {
        self.conn = None;
    }

    /// Shut down and drop the connection, if one is open
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            tracing::info!(addr = %self.addr, "Closing destination connection");
            if let Err(e) = conn.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "Destination close error");
            }
        }
    }

    async fn dial<C>(&mut self, connector: &C) -> bool
    where
        C: Connector<Stream = S>,
    {
        match connector.connect(self.addr).await {
            Ok(conn) => {
                tracing::info!(addr = %self.addr, "Destination connected");
                self.conn = Some(conn);
                true
            }
            Err(e) => {
                tracing::warn!(addr = %self.addr, error = %e, "Dial failed");
                false
            }
        }
    }
}

async fn write_snapshot<S>(conn: &mut S, data: &Bytes) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    conn.write_all(data).await?;
    conn.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::mock::{Behavior, MockConnector, MockStream};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_first_flush_dials_lazily() {
        let connector = MockConnector::new().with(addr(1), Behavior::Accept);
        let mut entry = WriterEntry::<MockStream>::new(addr(1));
        assert!(!entry.is_connected());

        let outcome = entry
            .deliver(&connector, &Bytes::from_static(b"a\0"), 3)
            .await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
        assert!(entry.is_connected());
        assert_eq!(connector.received(addr(1)), b"a\0");
        assert_eq!(connector.dials(), 1);
    }

    #[tokio::test]
    async fn test_connection_reused_between_flushes() {
        let connector = MockConnector::new().with(addr(1), Behavior::Accept);
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        entry.deliver(&connector, &Bytes::from_static(b"a"), 3).await;
        entry.deliver(&connector, &Bytes::from_static(b"b"), 3).await;

        assert_eq!(connector.dials(), 1);
        assert_eq!(connector.received(addr(1)), b"ab");
    }

    #[tokio::test]
    async fn test_dial_failure_gives_up_immediately() {
        let connector = MockConnector::new().with(addr(1), Behavior::RefuseDial);
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        let outcome = entry.deliver(&connector, &Bytes::from_static(b"x"), 3).await;

        assert_eq!(outcome, DeliveryOutcome::DialFailed);
        assert_eq!(connector.dials(), 1);
        assert_eq!(connector.writes(), 0);
        assert!(!entry.is_connected());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_counts_attempts() {
        let connector = MockConnector::new().with(addr(1), Behavior::FailWrites);
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        let outcome = entry.deliver(&connector, &Bytes::from_static(b"x"), 4).await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 4 });
        assert_eq!(connector.writes(), 4);
        // Initial dial plus one redial between each pair of attempts
        assert_eq!(connector.dials(), 4);
        assert!(!entry.is_connected());

        // Next flush starts from scratch
        let outcome = entry.deliver(&connector, &Bytes::from_static(b"y"), 4).await;
        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 4 });
        assert_eq!(connector.writes(), 8);
    }

    #[tokio::test]
    async fn test_redial_recovers_after_broken_stream() {
        let connector = MockConnector::new().with(addr(1), Behavior::FailFirstWrites(2));
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        let outcome = entry.deliver(&connector, &Bytes::from_static(b"ok"), 3).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
        assert_eq!(connector.received(addr(1)), b"ok");
        assert_eq!(connector.dials(), 3);
    }

    #[tokio::test]
    async fn test_refused_redial_spends_one_attempt() {
        // Dial 1 yields a broken stream, dial 2 is refused, dial 3 works
        let connector = MockConnector::new().with(
            addr(1),
            Behavior::Flaky {
                fail_writes: 1,
                refuse_dial: 2,
            },
        );
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        let outcome = entry.deliver(&connector, &Bytes::from_static(b"ok"), 3).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
        assert_eq!(connector.dials(), 3);
        assert_eq!(connector.received(addr(1)), b"ok");
        assert!(entry.is_connected());
    }

    #[tokio::test]
    async fn test_refused_final_redial_exhausts_budget() {
        let connector = MockConnector::new().with(
            addr(1),
            Behavior::Flaky {
                fail_writes: 1,
                refuse_dial: 2,
            },
        );
        let mut entry = WriterEntry::<MockStream>::new(addr(1));

        let outcome = entry.deliver(&connector, &Bytes::from_static(b"x"), 2).await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 2 });
        assert_eq!(connector.dials(), 2);
        assert_eq!(connector.writes(), 1);
        assert!(!entry.is_connected());
    }

    #[tokio::test]
    async fn test_close_shuts_down_connection() {
        let connector = MockConnector::new().with(addr(1), Behavior::Accept);
        let mut entry = WriterEntry::<MockStream>::new(addr(1));
        entry.deliver(&connector, &Bytes::from_static(b"a"), 1).await;

        entry.close().await;

        assert!(!entry.is_connected());
        assert_eq!(connector.shutdowns(), 1);

        // Closing twice is a no-op
        entry.close().await;
        assert_eq!(connector.shutdowns(), 1);
    }
}
