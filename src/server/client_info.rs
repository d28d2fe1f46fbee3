// Client connection tracking and deferred reply delivery

use crate::protocol::RespValue;
use crate::storage::current_timestamp_ms;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Stable identity of a connection, handed out once per accept
pub type ClientId = u64;

static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique client id
pub fn next_client_id() -> ClientId {
    CLIENT_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: ClientId,
    /// Client address (IP:port)
    pub addr: String,
    /// Set by CLIENT SETNAME
    pub name: Option<String>,
    /// Current database index
    pub db: usize,
    /// Last command executed
    pub cmd: String,
    /// Connection creation timestamp (ms)
    pub created_at: u64,
    /// Last activity timestamp (ms)
    pub last_activity: u64,
    /// Replies produced outside the connection's own request/response cycle
    reply_tx: mpsc::UnboundedSender<RespValue>,
}

impl ClientInfo {
    fn new(id: ClientId, addr: String, reply_tx: mpsc::UnboundedSender<RespValue>) -> Self {
        let now = current_timestamp_ms();
        Self {
            id,
            addr,
            name: None,
            db: 0,
            cmd: String::new(),
            created_at: now,
            last_activity: now,
            reply_tx,
        }
    }

    /// Format as CLIENT LIST entry
    pub fn to_list_entry(&self) -> String {
        let now = current_timestamp_ms();
        format!(
            "id={} addr={} name={} age={} idle={} db={} cmd={}",
            self.id,
            self.addr,
            self.name.as_deref().unwrap_or(""),
            now.saturating_sub(self.created_at) / 1000,
            now.saturating_sub(self.last_activity) / 1000,
            self.db,
            self.cmd
        )
    }
}

/// Registry of live connections, shared by the server and the wait registry
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<DashMap<ClientId, ClientInfo>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// Returns the client id and the receiving half of its deferred reply channel.
    pub fn register(&self, addr: String) -> (ClientId, mpsc::UnboundedReceiver<RespValue>) {
        let id = next_client_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(id, ClientInfo::new(id, addr, tx));
        (id, rx)
    }

    pub fn unregister(&self, id: ClientId) {
        self.clients.remove(&id);
    }

    pub fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.clients.get(&id).map(|entry| entry.clone())
    }

    /// Deliver a deferred reply. Returns false when the client is gone.
    pub fn send(&self, id: ClientId, value: RespValue) -> bool {
        match self.clients.get(&id) {
            Some(entry) => entry.reply_tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn set_name(&self, id: ClientId, name: String) {
        if let Some(mut entry) = self.clients.get_mut(&id) {
            entry.name = Some(name);
        }
    }

    pub fn get_name(&self, id: ClientId) -> Option<String> {
        self.clients.get(&id).and_then(|entry| entry.name.clone())
    }

    /// Mark client activity
    pub fn mark_activity(&self, id: ClientId, cmd: String, db_index: usize) {
        if let Some(mut entry) = self.clients.get_mut(&id) {
            entry.cmd = cmd;
            entry.db = db_index;
            entry.last_activity = current_timestamp_ms();
        }
    }

    /// All clients formatted for CLIENT LIST, ordered by id
    pub fn list(&self) -> String {
        let mut clients: Vec<ClientInfo> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by_key(|c| c.id);
        let mut result = String::new();
        for client in clients {
            result.push_str(&client.to_list_entry());
            result.push('\n');
        }
        result
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_registry() {
        let registry = ClientRegistry::new();
        let (id1, _rx1) = registry.register("127.0.0.1:1111".to_string());
        let (id2, _rx2) = registry.register("127.0.0.1:2222".to_string());

        assert_ne!(id1, id2);
        assert_eq!(registry.count(), 2);

        registry.set_name(id1, "client1".to_string());
        assert_eq!(registry.get_name(id1), Some("client1".to_string()));

        registry.unregister(id2);
        assert_eq!(registry.count(), 1);
        assert!(!registry.send(id2, RespValue::ok()));
    }

    #[test]
    fn test_deferred_reply() {
        let registry = ClientRegistry::new();
        let (id, mut rx) = registry.register("127.0.0.1:1111".to_string());

        assert!(registry.send(id, RespValue::Integer(7)));
        assert_eq!(rx.try_recv().unwrap(), RespValue::Integer(7));
    }

    #[test]
    fn test_send_to_dropped_receiver_fails() {
        let registry = ClientRegistry::new();
        let (id, rx) = registry.register("127.0.0.1:1111".to_string());
        drop(rx);
        assert!(!registry.send(id, RespValue::ok()));
    }

    #[test]
    fn test_client_list_format() {
        let registry = ClientRegistry::new();
        let (id, _rx) = registry.register("127.0.0.1:6379".to_string());
        registry.mark_activity(id, "llen".to_string(), 2);

        let list = registry.list();
        assert!(list.contains("addr=127.0.0.1:6379"));
        assert!(list.contains("db=2"));
        assert!(list.contains("cmd=llen"));
    }
}
