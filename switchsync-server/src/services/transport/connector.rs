use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};

use super::connection::Lifecycle;
use super::{Connection, ConnectionCallback, ConnectionState, MessageObserver};
use crate::errors::ConnectionError;

/// Establishes a [`Connection`] in either role.
///
/// Observers given here are registered before the first frame is read.
pub struct Connector {
    callback: Option<Arc<dyn ConnectionCallback>>,
    observers: Vec<Arc<dyn MessageObserver>>,
    retry_delay: Duration,
}

impl Connector {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
    pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);

    pub fn new() -> Self {
        Self {
            callback: None,
            observers: Vec::new(),
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn ConnectionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay.max(Self::MIN_RETRY_DELAY);
        self
    }

    /// Dials `host:port` until it answers or `connect_timeout` runs out.
    pub async fn connect_as_initiator(
        self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Connection, ConnectionError> {
        let lifecycle = Lifecycle::new(self.callback);
        let deadline = Instant::now() + connect_timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match time::timeout_at(deadline, TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => {
                    tracing::debug!("Reached {}:{} after {} attempt(s)", host, port, attempts);
                    return Connection::establish(stream, lifecycle, None, None, self.observers);
                }
                Ok(Err(e)) => {
                    tracing::trace!("Connect attempt {} to {}:{} failed: {}", attempts, host, port, e);
                }
                Err(_) => break,
            }

            let retry_at = Instant::now() + self.retry_delay;
            if retry_at >= deadline {
                break;
            }
            time::sleep_until(retry_at).await;
        }

        tracing::warn!("Gave up on {}:{} after {} attempt(s)", host, port, attempts);
        lifecycle.abort(ConnectionState::Timeout);
        Err(ConnectionError::Timeout(connect_timeout))
    }

    /// Binds the listening socket without waiting for a peer.
    pub async fn bind(self, addr: SocketAddr) -> Result<Acceptor, ConnectionError> {
        let lifecycle = Lifecycle::new(self.callback);

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!("Waiting for a peer on {}", addr);
                Ok(Acceptor {
                    listener,
                    lifecycle,
                    observers: self.observers,
                })
            }
            Err(e) => {
                tracing::error!("Failed to bind {}: {}", addr, e);
                lifecycle.abort(ConnectionState::Error);
                Err(e.into())
            }
        }
    }

    /// Binds `addr` and accepts exactly one peer within `accept_timeout`.
    pub async fn connect_as_acceptor(
        self,
        addr: SocketAddr,
        accept_timeout: Duration,
    ) -> Result<Connection, ConnectionError> {
        self.bind(addr).await?.accept(accept_timeout).await
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound listening socket waiting for its single peer.
pub struct Acceptor {
    listener: TcpListener,
    lifecycle: Lifecycle,
    observers: Vec<Arc<dyn MessageObserver>>,
}

impl Acceptor {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The accept timeout also bounds every read once connected.
    pub async fn accept(self, accept_timeout: Duration) -> Result<Connection, ConnectionError> {
        let accepted = time::timeout(accept_timeout, self.listener.accept()).await;

        match accepted {
            Ok(Ok((stream, _))) => Connection::establish(
                stream,
                self.lifecycle,
                Some(accept_timeout),
                Some(self.listener),
                self.observers,
            ),
            Ok(Err(e)) => {
                tracing::error!("Failed to accept a peer: {}", e);
                self.lifecycle.abort(ConnectionState::Error);
                Err(e.into())
            }
            Err(_) => {
                tracing::debug!("No peer within {:?}", accept_timeout);
                self.lifecycle.abort(ConnectionState::Timeout);
                Err(ConnectionError::Timeout(accept_timeout))
            }
        }
    }
}
