//! Open pages ("clients") the worker can control and message.
//!
//! Each client gets its own bounded channel. Claiming and broadcasting are
//! the only operations that fan out to more than one client.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::models::ClientMessage;

/// Buffer size for each client's message channel
const CHANNEL_BUFFER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

struct ClientHandle {
    url: String,
    /// Version of the worker controlling this client
    controller: Option<String>,
    tx: mpsc::Sender<ClientMessage>,
}

#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<BTreeMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page showing `url`. Messages for it arrive on the receiver.
    pub async fn open(&self, url: &str) -> (ClientId, mpsc::Receiver<ClientMessage>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.clients.write().await.insert(
            id,
            ClientHandle {
                url: url.to_string(),
                controller: None,
                tx,
            },
        );
        debug!(client = %id, url, "Client opened");
        (id, rx)
    }

    pub async fn close(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    /// Record that the client navigated to `url`.
    pub async fn set_url(&self, id: ClientId, url: &str) -> bool {
        match self.clients.write().await.get_mut(&id) {
            Some(client) => {
                client.url = url.to_string();
                true
            }
            None => false,
        }
    }

    pub async fn url(&self, id: ClientId) -> Option<String> {
        self.clients.read().await.get(&id).map(|c| c.url.clone())
    }

    pub async fn controller(&self, id: ClientId) -> Option<String> {
        self.clients.read().await.get(&id).and_then(|c| c.controller.clone())
    }

    /// Put every open client under the worker at `version`.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        for client in clients.values_mut() {
            client.controller = Some(version.to_string());
        }
        clients.len()
    }

    pub async fn controlled_by(&self, version: &str) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.controller.as_deref() == Some(version))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Send `message` to every client. Returns how many received it;
    /// clients whose receiver is gone are dropped from the registry.
    pub async fn broadcast(&self, message: ClientMessage) -> usize {
        let targets: Vec<(ClientId, mpsc::Sender<ClientMessage>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, c)| (*id, c.tx.clone()))
            .collect();

        let sends = targets.into_iter().map(|(id, tx)| {
            let message = message.clone();
            async move { (id, tx.send(message).await) }
        });
        self.deliver(join_all(sends).await).await
    }

    /// Tell every client to reload the URL it is showing.
    pub async fn navigate_all(&self) -> usize {
        let targets: Vec<(ClientId, String, mpsc::Sender<ClientMessage>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, c)| (*id, c.url.clone(), c.tx.clone()))
            .collect();

        let sends = targets.into_iter().map(|(id, url, tx)| async move {
            (id, tx.send(ClientMessage::Navigate { url }).await)
        });
        self.deliver(join_all(sends).await).await
    }

    async fn deliver(
        &self,
        results: Vec<(ClientId, Result<(), mpsc::error::SendError<ClientMessage>>)>,
    ) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(client = %id, error = %e, "Failed to message client - channel closed");
                    gone.push(id);
                }
            }
        }
        if !gone.is_empty() {
            let mut clients = self.clients.write().await;
            for id in gone {
                clients.remove(&id);
            }
        }
        delivered
    }
}
