// Blocking list pops (BLPOP/BRPOP waiters, wake on push, timeouts)

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::context::ServerContext;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::server::ClientId;
use crate::server::ClientRegistry;
use crate::storage::{current_timestamp_ms, ListStorage, StorageError, StorageResult};

/// Longest accepted blocking timeout, in seconds
pub const MAX_BLOCK_TIMEOUT_SECS: i64 = 10 * 365 * 24 * 3600;

/// Which end of the list a waiter pops from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopDirection {
    Left,
    Right,
}

/// One waiter in one key's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedConnEntry {
    pub conn: ClientId,
    /// Milliseconds since the epoch, `None` waits forever
    pub deadline: Option<u64>,
    pub key: Bytes,
}

#[derive(Debug)]
struct BlockedClient {
    db: usize,
    keys: Vec<Bytes>,
    direction: PopDirection,
    deadline: Option<u64>,
}

#[derive(Default)]
struct RegistryState {
    queues: HashMap<(usize, Bytes), VecDeque<BlockedConnEntry>>,
    blocked: HashMap<ClientId, BlockedClient>,
    deadlines: BTreeSet<(u64, ClientId)>,
}

impl RegistryState {
    /// Drop `conn` from every queue it sits in
    fn remove_client(&mut self, conn: ClientId) -> bool {
        let Some(client) = self.blocked.remove(&conn) else {
            return false;
        };
        for key in client.keys {
            let qkey = (client.db, key);
            if let Some(queue) = self.queues.get_mut(&qkey) {
                queue.retain(|entry| entry.conn != conn);
                if queue.is_empty() {
                    self.queues.remove(&qkey);
                }
            }
        }
        if let Some(deadline) = client.deadline {
            self.deadlines.remove(&(deadline, conn));
        }
        true
    }
}

/// Key → FIFO of blocked connections, plus per-client state and a deadline index
///
/// A push onto a key calls [`BlockingRegistry::serve`], which hands elements
/// to the waiters in registration order through each connection's deferred
/// reply channel. Registration, wake, timeout and disconnect all run under
/// one mutex, so a waiter is resolved exactly once. Lock order is database
/// lock, then this mutex, then the storage shard.
#[derive(Default)]
pub struct BlockingRegistry {
    state: Mutex<RegistryState>,
}

fn pop_one(
    storage: &dyn ListStorage,
    db: usize,
    key: &[u8],
    direction: PopDirection,
) -> StorageResult<Bytes> {
    let popped = match direction {
        PopDirection::Left => storage.lpop(db, key, 1)?,
        PopDirection::Right => storage.rpop(db, key, 1)?,
    };
    popped.into_iter().next().ok_or(StorageError::NotFound)
}

/// Undo `pop_one`, putting `value` back on the side it came from
fn push_back(
    storage: &dyn ListStorage,
    db: usize,
    key: &[u8],
    direction: PopDirection,
    value: Bytes,
) -> StorageResult<usize> {
    let values = [value];
    match direction {
        PopDirection::Left => storage.lpush(db, key, &values),
        PopDirection::Right => storage.rpush(db, key, &values),
    }
}

impl BlockingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop from the first non-empty key, or park `conn` on all of them.
    ///
    /// Returns the `(key, value)` pair on an immediate hit and `None` once
    /// the connection is queued. Storage errors other than not-found abort
    /// without registering.
    pub fn pop_or_block(
        &self,
        storage: &dyn ListStorage,
        db: usize,
        keys: &[Bytes],
        direction: PopDirection,
        deadline: Option<u64>,
        conn: ClientId,
    ) -> StorageResult<Option<(Bytes, Bytes)>> {
        let mut state = self.lock();

        for key in keys {
            match pop_one(storage, db, key, direction) {
                Ok(value) => return Ok(Some((key.clone(), value))),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        // A connection blocks on one command at a time
        state.remove_client(conn);

        let mut unique: Vec<Bytes> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(key) {
                unique.push(key.clone());
            }
        }

        for key in &unique {
            state
                .queues
                .entry((db, key.clone()))
                .or_default()
                .push_back(BlockedConnEntry {
                    conn,
                    deadline,
                    key: key.clone(),
                });
        }
        if let Some(deadline) = deadline {
            state.deadlines.insert((deadline, conn));
        }
        state.blocked.insert(
            conn,
            BlockedClient {
                db,
                keys: unique,
                direction,
                deadline,
            },
        );

        debug!(client = conn, db, keys = keys.len(), ?deadline, "client blocked");
        Ok(None)
    }

    /// Hand elements of `key` to its waiters, oldest first.
    ///
    /// A waiter whose connection is gone is dropped and its element goes
    /// back on the list. Stops at the first not-found. Returns how many waiters
    /// received an element.
    pub fn serve(
        &self,
        storage: &dyn ListStorage,
        clients: &ClientRegistry,
        db: usize,
        key: &[u8],
    ) -> usize {
        let mut state = self.lock();
        let qkey = (db, Bytes::copy_from_slice(key));
        if !state.queues.contains_key(&qkey) {
            return 0;
        }

        let mut served = 0;
        loop {
            let Some(entry) = state.queues.get(&qkey).and_then(|q| q.front()).cloned() else {
                break;
            };

            let direction = state
                .blocked
                .get(&entry.conn)
                .map_or(PopDirection::Left, |b| b.direction);

            match pop_one(storage, db, key, direction) {
                Ok(value) => {
                    if clients.send(entry.conn, RespValue::bulk_array([&qkey.1, &value])) {
                        served += 1;
                    } else {
                        // Connection closed before it could deregister
                        trace!(client = entry.conn, "returning element of disconnected waiter");
                        if let Err(e) = push_back(storage, db, key, direction, value) {
                            warn!(error = %e, "failed to restore element for disconnected waiter");
                        }
                    }
                }
                Err(e) if e.is_not_found() => break,
                Err(e) => {
                    warn!(client = entry.conn, error = %e, "failed to serve blocked client");
                    clients.send(entry.conn, CommandError::from(e).into());
                }
            }
            if !state.remove_client(entry.conn) {
                Self::drop_front(&mut state, &qkey);
            }
        }

        if served > 0 {
            debug!(db, served, "served blocked clients");
        }
        served
    }

    fn drop_front(state: &mut RegistryState, qkey: &(usize, Bytes)) {
        if let Some(queue) = state.queues.get_mut(qkey) {
            queue.pop_front();
            if queue.is_empty() {
                state.queues.remove(qkey);
            }
        }
    }

    /// Remove every waiter whose deadline is at or before `now_ms`
    pub fn expire(&self, now_ms: u64) -> Vec<ClientId> {
        let mut state = self.lock();
        let due: Vec<ClientId> = state
            .deadlines
            .iter()
            .take_while(|(deadline, _)| *deadline <= now_ms)
            .map(|(_, conn)| *conn)
            .collect();
        for conn in &due {
            state.remove_client(*conn);
        }
        due
    }

    /// Expire due waiters and send each the timeout reply
    pub fn expire_and_notify(&self, clients: &ClientRegistry, now_ms: u64) -> usize {
        let expired = self.expire(now_ms);
        for conn in &expired {
            clients.send(*conn, RespValue::nil_array());
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "blocked clients timed out");
        }
        expired.len()
    }

    /// Forget a connection, e.g. on disconnect
    pub fn unblock_client(&self, conn: ClientId) -> bool {
        self.lock().remove_client(conn)
    }

    pub fn is_blocked(&self, conn: ClientId) -> bool {
        self.lock().blocked.contains_key(&conn)
    }

    /// Connections queued on `key`, in service order
    pub fn waiters(&self, db: usize, key: &[u8]) -> Vec<ClientId> {
        self.lock()
            .queues
            .get(&(db, Bytes::copy_from_slice(key)))
            .map(|q| q.iter().map(|e| e.conn).collect())
            .unwrap_or_default()
    }

    /// Queue entries for `key`, in service order
    pub fn entries(&self, db: usize, key: &[u8]) -> Vec<BlockedConnEntry> {
        self.lock()
            .queues
            .get(&(db, Bytes::copy_from_slice(key)))
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn blocked_count(&self) -> usize {
        self.lock().blocked.len()
    }

    /// Number of keys with at least one waiter
    pub fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }
}

/// Parse a blocking timeout argument into an absolute deadline.
///
/// `0` means no deadline.
pub fn parse_block_timeout(arg: &[u8], now_ms: u64) -> Result<Option<u64>, CommandError> {
    let secs: i64 = std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::InvalidInt)?;
    if !(0..=MAX_BLOCK_TIMEOUT_SECS).contains(&secs) {
        return Err(CommandError::Other(
            "timeout can't be a negative value and can't exceed the number of seconds in 10 years"
                .to_string(),
        ));
    }
    if secs == 0 {
        return Ok(None);
    }
    Ok(Some(now_ms + secs as u64 * 1000))
}

/// Periodically time out blocked clients.
///
/// The task holds only a weak handle and exits once the server context is gone.
pub fn spawn_timeout_reaper(ctx: Weak<ServerContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = match ctx.upgrade() {
                Some(ctx) => {
                    ctx.blocking
                        .expire_and_notify(&ctx.clients, current_timestamp_ms());
                    ctx.config.blocking_sweep_interval_ms()
                }
                None => break,
            };
            tokio::time::sleep(Duration::from_millis(interval.max(1))).await;
        }
        debug!("timeout reaper stopped");
    })
}
