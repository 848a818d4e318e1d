//! Relay listener
//!
//! Handles the TCP accept loop, spawns one reader per inbound connection and
//! runs the flush scheduler alongside.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::buffer::SharedBuffer;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::flush::FlushScheduler;
use crate::ingest::read_frames;
use crate::writer::{Connector, TcpConnector, WriterSet};

/// Buffering TCP duplicator
pub struct Relay<C: Connector = TcpConnector> {
    config: RelayConfig,
    buffer: Arc<SharedBuffer>,
    writers: Arc<WriterSet<C>>,
    next_conn_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Relay<TcpConnector> {
    /// Create a relay that dials destinations over TCP
    pub fn new(config: RelayConfig) -> Self {
        let connector = TcpConnector::new(config.connect_timeout);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> Relay<C> {
    /// Create a relay with a custom destination connector
    pub fn with_connector(config: RelayConfig, connector: C) -> Self {
        let writers = WriterSet::with_destinations(
            connector,
            config.retry_count,
            config.destinations.iter().copied(),
        );

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            buffer: Arc::new(SharedBuffer::new()),
            writers: Arc::new(writers),
            next_conn_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Shared ingestion buffer
    pub fn buffer(&self) -> &Arc<SharedBuffer> {
        &self.buffer
    }

    /// Destination writer set; destinations may be attached or detached
    /// while the relay runs
    pub fn writers(&self) -> &Arc<WriterSet<C>> {
        &self.writers
    }

    /// Bind the configured address and run until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Run on an already bound listener until `shutdown` completes
    ///
    /// On shutdown, accepting stops, every reader appends what it holds and
    /// exits, and only then does the scheduler drain the buffer one last
    /// time and close the destinations.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            destinations = self.config.destinations.len(),
            "Relay listening"
        );

        let ingest_cancel = CancellationToken::new();
        let flush_cancel = CancellationToken::new();
        let readers = TaskTracker::new();

        let scheduler = FlushScheduler::new(
            Arc::clone(&self.buffer),
            Arc::clone(&self.writers),
            &self.config,
        );
        let scheduler_handle = tokio::spawn(scheduler.run(flush_cancel.clone()));

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.accept_loop(&listener, &readers, &ingest_cancel) => {}
        }

        drop(listener);
        ingest_cancel.cancel();
        readers.close();
        readers.wait().await;

        flush_cancel.cancel();
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "Flush scheduler task failed");
        }

        tracing::info!("Relay stopped");
        Ok(())
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        readers: &TaskTracker,
        cancel: &CancellationToken,
    ) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, readers, cancel);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        readers: &TaskTracker,
        cancel: &CancellationToken,
    ) {
        // Check connection limit
        let permit: Option<OwnedSemaphorePermit> = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(conn_id = conn_id, peer = %peer_addr, "Accepted connection");

        let buffer = Arc::clone(&self.buffer);
        let max_frame_size = self.config.max_frame_size;
        let cancel = cancel.clone();

        readers.spawn(async move {
            let _permit = permit;
            let mut socket = socket;

            match read_frames(&mut socket, &buffer, max_frame_size, &cancel).await {
                Ok(summary) => {
                    tracing::debug!(
                        conn_id = conn_id,
                        frames = summary.frames,
                        bytes = summary.bytes,
                        "Connection stream ended"
                    );
                }
                Err(e) => {
                    tracing::warn!(conn_id = conn_id, peer = %peer_addr, error = %e, "Read error");
                }
            }

            tracing::info!(conn_id = conn_id, peer = %peer_addr, "Closing connection");
            if let Err(e) = socket.shutdown().await {
                tracing::warn!(conn_id = conn_id, error = %e, "Closing error");
            }
        });
    }
}
