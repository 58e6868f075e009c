use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use switchsync_api::Message;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::time;

use super::{Dispatcher, MessageObserver};
use crate::errors::ConnectionError;

/// Longest accepted frame including its terminator; a longer one fails the connection.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Error,
    Timeout,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unconnected => "UNCONNECTED",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Error => "ERROR",
            ConnectionState::Timeout => "TIMEOUT",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Receives every lifecycle transition of one connection.
///
/// Called while the connection state is locked, so implementations must not
/// call back into the connection.
pub trait ConnectionCallback: Send + Sync {
    fn on_state_change(&self, state: ConnectionState);
}

impl ConnectionCallback for mpsc::UnboundedSender<ConnectionState> {
    fn on_state_change(&self, state: ConnectionState) {
        let _ = self.send(state);
    }
}

/// State machine shared by the establishment and the live connection.
///
/// `Closed` is terminal: later transitions are refused, so it is reported once.
pub(crate) struct Lifecycle {
    state: Mutex<ConnectionState>,
    callback: Option<Arc<dyn ConnectionCallback>>,
}

impl Lifecycle {
    pub(crate) fn new(callback: Option<Arc<dyn ConnectionCallback>>) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Unconnected),
            callback,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == ConnectionState::Closed || *state == next {
            return false;
        }

        tracing::info!("Connection state {} -> {}", *state, next);
        *state = next;

        if let Some(callback) = &self.callback {
            callback.on_state_change(next);
        }
        true
    }

    /// Reports a failed establishment.
    pub(crate) fn abort(&self, failure: ConnectionState) {
        self.transition(failure);
        self.transition(ConnectionState::Closed);
    }
}

struct Inner {
    peer: SocketAddr,
    lifecycle: Lifecycle,
    closing: AtomicBool,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    listener: Mutex<Option<TcpListener>>,
    dispatcher: Dispatcher,
    shutdown: Notify,
}

/// One live line-oriented link to a peer.
///
/// Cloning is cheap and every clone drives the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn establish(
        stream: TcpStream,
        lifecycle: Lifecycle,
        read_timeout: Option<Duration>,
        listener: Option<TcpListener>,
        observers: Vec<Arc<dyn MessageObserver>>,
    ) -> Result<Self, ConnectionError> {
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => {
                lifecycle.abort(ConnectionState::Error);
                return Err(e.into());
            }
        };

        let (reader, writer) = stream.into_split();
        let connection = Self {
            inner: Arc::new(Inner {
                peer,
                lifecycle,
                closing: AtomicBool::new(false),
                writer: AsyncMutex::new(Some(writer)),
                listener: Mutex::new(listener),
                dispatcher: Dispatcher::new(observers),
                shutdown: Notify::new(),
            }),
        };

        tracing::info!("Connected to {}", peer);
        connection.inner.lifecycle.transition(ConnectionState::Connected);

        tokio::spawn(connection.clone().read_loop(BufReader::new(reader), read_timeout));

        Ok(connection)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Writes one frame.
    ///
    /// Returns `Ok(false)` without touching the socket when not connected. A
    /// failed write moves the connection to `Error` and closes it.
    pub async fn send(&self, message: &Message) -> Result<bool, ConnectionError> {
        if !self.is_connected() {
            return Ok(false);
        }

        let frame = message.encode_frame()?;

        let mut writer = self.inner.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            return Ok(false);
        };

        let result = match stream.write_all(frame.as_bytes()).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);

        match result {
            Ok(()) => {
                tracing::debug!(peer = %self.inner.peer, "Sent {:?}", message.action);
                Ok(true)
            }
            Err(e) => {
                tracing::error!(peer = %self.inner.peer, "Failed to send frame: {}", e);
                self.fail().await;
                Err(e.into())
            }
        }
    }

    pub async fn register_observer(&self, observer: Arc<dyn MessageObserver>) -> bool {
        self.is_connected() && self.inner.dispatcher.register(observer).await
    }

    pub async fn unregister_observer(&self, observer: &Arc<dyn MessageObserver>) -> bool {
        self.is_connected() && self.inner.dispatcher.unregister(observer).await
    }

    /// Stops reading, releases both sockets and reports `Closed`. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.shutdown.notify_one();
        self.inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.dispatcher.clear().await;
        self.inner.lifecycle.transition(ConnectionState::Closed);

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        tracing::info!("Connection to {} closed", self.inner.peer);
    }

    async fn fail(&self) {
        if !self.inner.closing.load(Ordering::SeqCst) {
            self.inner.lifecycle.transition(ConnectionState::Error);
        }
        self.close().await;
    }

    async fn read_loop(self, mut reader: BufReader<OwnedReadHalf>, read_timeout: Option<Duration>) {
        let mut buffer = Vec::new();

        loop {
            if self.inner.closing.load(Ordering::SeqCst) {
                break;
            }

            buffer.clear();
            let result = tokio::select! {
                _ = self.inner.shutdown.notified() => break,
                result = read_frame(&mut reader, &mut buffer, read_timeout) => result,
            };

            match result {
                Ok(0) => {
                    tracing::info!("Peer {} disconnected", self.inner.peer);
                    break;
                }
                Ok(_) => {
                    self.inner.dispatcher.dispatch(&self, &buffer).await;
                }
                Err(e) => {
                    tracing::warn!(peer = %self.inner.peer, "Failed to read frame: {}", e);
                    self.fail().await;
                    return;
                }
            }
        }

        self.close().await;
    }
}

async fn read_frame(
    reader: &mut BufReader<OwnedReadHalf>,
    buffer: &mut Vec<u8>,
    read_timeout: Option<Duration>,
) -> io::Result<usize> {
    let mut frame = (&mut *reader).take(MAX_FRAME_LEN as u64);
    let read = match read_timeout {
        Some(limit) => time::timeout(limit, frame.read_until(b'\n', buffer))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "peer stayed silent"))??,
        None => frame.read_until(b'\n', buffer).await?,
    };

    if read == MAX_FRAME_LEN && buffer.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame exceeds {} bytes", MAX_FRAME_LEN),
        ));
    }
    Ok(read)
}
