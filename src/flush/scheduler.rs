//! Periodic flush loop

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::policy::FlushPolicy;
use crate::buffer::SharedBuffer;
use crate::config::RelayConfig;
use crate::writer::{Connector, FlushReport, TcpConnector, WriterSet};

/// Single loop that moves buffered data to the writer set
///
/// Polls every `poll_interval` (a fifth of the flush interval). A due flush
/// is awaited to completion before the next poll, so at most one snapshot is
/// ever in flight. The buffer lock is held only while deciding and taking
/// the snapshot, never across network writes.
pub struct FlushScheduler<C: Connector = TcpConnector> {
    buffer: Arc<SharedBuffer>,
    writers: Arc<WriterSet<C>>,
    policy: FlushPolicy,
    poll_interval: Duration,
    drain_timeout: Duration,
}

impl<C: Connector> FlushScheduler<C> {
    /// Create a scheduler from the relay configuration
    pub fn new(buffer: Arc<SharedBuffer>, writers: Arc<WriterSet<C>>, config: &RelayConfig) -> Self {
        Self {
            buffer,
            writers,
            policy: FlushPolicy::from_config(config),
            poll_interval: config.poll_interval(),
            drain_timeout: config.drain_timeout,
        }
    }

    /// Flush policy in use
    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// One poll: flush if due and move the deadline forward
    pub async fn tick(
        &self,
        deadline: &mut Instant,
        cancel: &CancellationToken,
    ) -> Option<FlushReport> {
        let now = Instant::now();
        let snapshot = self
            .buffer
            .snapshot_if(|len| self.policy.should_flush(now, *deadline, len))
            .await?;

        tracing::debug!(bytes = snapshot.len(), "Flush triggered");
        let report = self.writers.flush(snapshot, cancel).await;
        *deadline = self.policy.next_deadline(Instant::now());

        Some(report)
    }

    /// Run until `cancel` fires, then drain and close destinations
    ///
    /// A flush still in flight when `cancel` fires runs on. It and the final
    /// drain share one budget of `drain_timeout`, counted from cancellation;
    /// deliveries still running when it expires are abandoned.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = self.policy.next_deadline(Instant::now());

        let flush_cancel = CancellationToken::new();
        let expiry = tokio::spawn(expire_after(
            cancel.clone(),
            flush_cancel.clone(),
            self.drain_timeout,
        ));

        tracing::debug!(
            poll_ms = self.poll_interval.as_millis() as u64,
            interval_ms = self.policy.interval.as_millis() as u64,
            threshold = self.policy.size_threshold,
            "Flush scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut deadline, &flush_cancel).await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        self.drain(&flush_cancel).await;
        expiry.abort();
    }

    /// Final flush of whatever is buffered
    async fn drain(&self, flush_cancel: &CancellationToken) {
        let snapshot = self.buffer.snapshot_and_clear().await;

        if !snapshot.is_empty() {
            tracing::info!(bytes = snapshot.len(), "Draining buffer before shutdown");
            self.writers.flush(snapshot, flush_cancel).await;
        }
        if flush_cancel.is_cancelled() {
            tracing::warn!(
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "Drain timed out, undelivered data dropped"
            );
        }

        self.writers.close_all().await;
        tracing::info!("Flush scheduler stopped");
    }
}

/// Cancel `flush_cancel` once `grace` has passed after `shutdown`
async fn expire_after(shutdown: CancellationToken, flush_cancel: CancellationToken, grace: Duration) {
    shutdown.cancelled().await;
    tokio::time::sleep(grace).await;
    flush_cancel.cancel();
}
