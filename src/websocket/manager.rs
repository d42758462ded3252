use crate::models::websocket::ServerEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

pub type EventSender = mpsc::Sender<ServerEvent>;
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// Outcome of a single best-effort delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Buffer full or channel already closed.
    Dropped,
    UnknownUser,
}

#[derive(Debug)]
struct UserConnection {
    connection_id: Uuid,
    sender: EventSender,
}

/// Process-wide registry of live client connections, keyed by identity
/// (username). Delivery never blocks: a full outbound buffer drops the event.
#[derive(Clone)]
pub struct ConnectionHub {
    connections: Arc<DashMap<String, UserConnection>>,
    buffer_size: usize,
}

impl ConnectionHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Bounded channel sized for this hub's outbound buffer.
    pub fn channel(&self) -> (EventSender, EventReceiver) {
        mpsc::channel(self.buffer_size)
    }

    /// Binds `identity` to `sender`, replacing any previous binding.
    ///
    /// The replaced session keeps its own sender clone and is responsible for
    /// closing it. The returned id is needed to unregister.
    pub fn register(&self, identity: &str, sender: EventSender) -> Uuid {
        let connection_id = Uuid::new_v4();
        let previous = self.connections.insert(
            identity.to_string(),
            UserConnection {
                connection_id,
                sender,
            },
        );
        if previous.is_some() {
            tracing::info!(identity, %connection_id, "connection replaced for user");
        } else {
            tracing::info!(identity, %connection_id, "user connected");
        }
        connection_id
    }

    /// Removes the binding if it still belongs to `connection_id`. Dropping
    /// the stored sender closes the channel once the session drops its clone.
    pub fn unregister(&self, identity: &str, connection_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(identity, |_, conn| conn.connection_id == connection_id)
            .is_some();
        if removed {
            tracing::info!(identity, %connection_id, "user disconnected");
        }
        removed
    }

    pub fn send(&self, identity: &str, event: ServerEvent) -> Delivery {
        let event_type = event.event_type();

        // Clone the sender so the shard lock is released before enqueueing.
        let sender = match self.connections.get(identity) {
            Some(conn) => conn.sender.clone(),
            None => {
                tracing::debug!(identity, event_type, "user not connected, event dropped");
                return Delivery::UnknownUser;
            }
        };

        match sender.try_send(event) {
            Ok(()) => {
                tracing::debug!(identity, event_type, "event delivered");
                Delivery::Delivered
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(identity, event_type, "outbound buffer full, event dropped");
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(identity, event_type, "connection closed, event dropped");
                Delivery::Dropped
            }
        }
    }

    /// Sends the same event to each identity.
    pub fn send_to_all<'a, I>(&self, identities: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for identity in identities {
            self.send(identity, event.clone());
        }
    }

    #[cfg(test)]
    pub fn is_connected(&self, identity: &str) -> bool {
        self.connections.contains_key(identity)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
