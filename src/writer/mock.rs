//! In-memory connector for delivery tests

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::AsyncWrite;

use super::connector::Connector;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Dial succeeds, writes succeed
    Accept,
    /// Every dial fails
    RefuseDial,
    /// Dial succeeds, every write fails
    FailWrites,
    /// The first `n` writes to this destination fail, later ones succeed
    FailFirstWrites(u32),
    /// Dial takes this long, then behaves like `Accept`
    SlowDial(Duration),
    /// The first `fail_writes` writes fail and dial number `refuse_dial`
    /// (counting from 1) is refused
    Flaky { fail_writes: u32, refuse_dial: u32 },
}

#[derive(Debug, Default)]
struct Destination {
    received: Mutex<Vec<u8>>,
    dials: AtomicU32,
    writes: AtomicU32,
}

#[derive(Debug, Default)]
pub struct MockConnector {
    behaviors: HashMap<SocketAddr, Behavior>,
    destinations: HashMap<SocketAddr, Arc<Destination>>,
    dials: AtomicU32,
    writes: Arc<AtomicU32>,
    shutdowns: Arc<AtomicU32>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, addr: SocketAddr, behavior: Behavior) -> Self {
        self.behaviors.insert(addr, behavior);
        self.destinations.insert(addr, Arc::default());
        self
    }

    pub fn received(&self, addr: SocketAddr) -> Vec<u8> {
        self.destinations
            .get(&addr)
            .map(|d| d.received.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn dials(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn writes_to(&self, addr: SocketAddr) -> u32 {
        self.destinations
            .get(&addr)
            .map(|d| d.writes.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Stream = MockStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<MockStream> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let nth_dial = self
            .destinations
            .get(&addr)
            .map(|d| d.dials.fetch_add(1, Ordering::SeqCst) + 1)
            .unwrap_or(0);

        let behavior = self
            .behaviors
            .get(&addr)
            .copied()
            .unwrap_or(Behavior::RefuseDial);

        match behavior {
            Behavior::RefuseDial => {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
            Behavior::SlowDial(delay) => tokio::time::sleep(delay).await,
            Behavior::Flaky { refuse_dial, .. } if nth_dial == refuse_dial => {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
            }
            _ => {}
        }

        Ok(MockStream {
            behavior,
            destination: Arc::clone(&self.destinations[&addr]),
            writes: Arc::clone(&self.writes),
            shutdowns: Arc::clone(&self.shutdowns),
        })
    }
}

#[derive(Debug)]
pub struct MockStream {
    behavior: Behavior,
    destination: Arc<Destination>,
    writes: Arc<AtomicU32>,
    shutdowns: Arc<AtomicU32>,
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let nth = self.destination.writes.fetch_add(1, Ordering::SeqCst) + 1;

        let fail = match self.behavior {
            Behavior::FailWrites => true,
            Behavior::FailFirstWrites(n) => nth <= n,
            Behavior::Flaky { fail_writes, .. } => nth <= fail_writes,
            _ => false,
        };
        if fail {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
        }

        self.destination
            .received
            .lock()
            .unwrap()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
