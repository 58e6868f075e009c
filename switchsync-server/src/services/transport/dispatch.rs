use std::str;
use std::sync::Arc;

use async_trait::async_trait;
use switchsync_api::Message;
use tokio::sync::{RwLock, mpsc};

use super::Connection;

/// Consumer of inbound messages on one connection.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_message(&self, connection: &Connection, message: Message);
}

#[async_trait]
impl MessageObserver for mpsc::UnboundedSender<Message> {
    async fn on_message(&self, _connection: &Connection, message: Message) {
        let _ = self.send(message);
    }
}

/// Turns frames into messages and hands them to every observer in registration order.
#[derive(Default)]
pub struct Dispatcher {
    observers: RwLock<Vec<Arc<dyn MessageObserver>>>,
}

impl Dispatcher {
    pub fn new(observers: Vec<Arc<dyn MessageObserver>>) -> Self {
        let mut unique: Vec<Arc<dyn MessageObserver>> = Vec::with_capacity(observers.len());
        for observer in observers {
            if !unique.iter().any(|known| same_observer(known, &observer)) {
                unique.push(observer);
            }
        }

        Self {
            observers: RwLock::new(unique),
        }
    }

    pub async fn register(&self, observer: Arc<dyn MessageObserver>) -> bool {
        let mut observers = self.observers.write().await;
        if observers.iter().any(|known| same_observer(known, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    pub async fn unregister(&self, observer: &Arc<dyn MessageObserver>) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|known| !same_observer(known, observer));
        observers.len() != before
    }

    pub async fn clear(&self) {
        self.observers.write().await.clear();
    }

    /// Delivers one frame and returns the number of observers reached.
    ///
    /// A frame that is not UTF-8 JSON reaches every observer as an `ERROR` message instead.
    pub async fn dispatch(&self, connection: &Connection, frame: &[u8]) -> usize {
        if frame.trim_ascii().is_empty() {
            return 0;
        }

        let decoded = str::from_utf8(frame)
            .map_err(|e| e.to_string())
            .and_then(|text| Message::decode_frame(text).map_err(|e| e.to_string()));

        let message = match decoded {
            Ok(message) => {
                tracing::debug!(peer = %connection.peer_addr(), "Received {:?}", message.action);
                message
            }
            Err(e) => {
                tracing::warn!(peer = %connection.peer_addr(), "Discarding malformed frame: {}", e);
                Message::error(format!("Malformed frame: {}", e))
            }
        };

        // Observers may close the connection or change the observer list while handling
        let observers = self.observers.read().await.clone();
        for observer in &observers {
            observer.on_message(connection, message.clone()).await;
        }

        observers.len()
    }
}

fn same_observer(left: &Arc<dyn MessageObserver>, right: &Arc<dyn MessageObserver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}
