//! Client registry: negotiates names and tracks connected clients.
//!
//! Names are unique among connected clients:
//!
//! - a client that asks for nothing gets `client-N`, N counting up from 1
//! - a taken name gets the first free `name-1`, `name-2`, ... suffix
//!
//! A name is released when its connection ends and may be handed out
//! again afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arena_protocol::{ConnectRequest, ServerFrame};
use tokio::sync::RwLock;

use crate::proxy::ClientHandle;
use crate::types::{ClientSummary, OutboundTx};

pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Arc<ClientHandle>>>,
    nameless: AtomicU64,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        ClientRegistry::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry {
            clients: RwLock::new(HashMap::new()),
            nameless: AtomicU64::new(1),
        }
    }

    /// Admit a client. Its negotiated name is sent to it on `outbound`
    /// before anything else.
    pub async fn register(&self, request: ConnectRequest, outbound: OutboundTx) -> Arc<ClientHandle> {
        let mut clients = self.clients.write().await;
        let name = self.negotiate_name(request.name.as_deref(), &clients);

        let _ = outbound.send(ServerFrame::Name { name: name.clone() }.to_line());
        let client = ClientHandle::new(name.clone(), request, outbound);
        clients.insert(name, Arc::clone(&client));
        client
    }

    fn negotiate_name(&self, requested: Option<&str>, taken: &HashMap<String, Arc<ClientHandle>>) -> String {
        match requested {
            None => loop {
                let n = self.nameless.fetch_add(1, Ordering::Relaxed);
                let candidate = format!("client-{n}");
                if !taken.contains_key(&candidate) {
                    return candidate;
                }
            },
            Some(name) if !taken.contains_key(name) => name.to_string(),
            Some(name) => (1u64..)
                .map(|n| format!("{name}-{n}"))
                .find(|candidate| !taken.contains_key(candidate))
                .unwrap_or_else(|| name.to_string()),
        }
    }

    /// Drop a client that has disconnected.
    pub async fn remove(&self, client: &ClientHandle) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get(client.name()) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), client) => {
                clients.remove(client.name());
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ClientHandle>> {
        self.clients.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Every connected client, sorted by name.
    pub async fn list(&self) -> Vec<ClientSummary> {
        let mut clients: Vec<_> = self
            .clients
            .read()
            .await
            .values()
            .map(|c| c.summary())
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        clients
    }

    /// Names of clients that play `kind` and have a free slot, sorted.
    pub async fn available_for_game(&self, kind: &str) -> Vec<String> {
        let mut names: Vec<_> = self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.supports(kind) && c.is_available())
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        names
    }
}
