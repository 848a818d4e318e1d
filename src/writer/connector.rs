//! Downstream connection factory

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

/// Opens write streams to downstream destinations
///
/// [`TcpConnector`] is the production implementation; the seam exists so
/// delivery and retry logic can run against in-memory streams.
pub trait Connector: Send + Sync + 'static {
    /// Stream produced by a successful dial
    type Stream: AsyncWrite + Unpin + Send + 'static;

    /// Dial `addr`
    fn connect(&self, addr: SocketAddr) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP dialer with a connect timeout
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector; `TCP_NODELAY` is enabled on every stream
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out after {:?}", addr, self.connect_timeout),
                )
            })??;

        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
