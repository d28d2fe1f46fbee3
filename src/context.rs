// Shared server state handed to every command

use crate::blocking::BlockingRegistry;
use crate::commands::CommandTable;
use crate::config::{ConfigManager, ServerConfig};
use crate::consensus::{Consensus, ConsensusNode};
use crate::server::ClientRegistry;
use crate::storage::{DbLocks, ListStorage, MemoryStorage};
use std::sync::Arc;

pub struct ServerContext {
    pub config: ConfigManager,
    pub storage: Arc<dyn ListStorage>,
    pub db_locks: DbLocks,
    pub blocking: BlockingRegistry,
    pub clients: ClientRegistry,
    pub consensus: Arc<dyn Consensus>,
    pub commands: CommandTable,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let databases = config.databases;
        let consensus = Arc::new(ConsensusNode::new(config.node_role()));
        Self {
            config: ConfigManager::new(config),
            storage: Arc::new(MemoryStorage::new(databases)),
            db_locks: DbLocks::new(databases),
            blocking: BlockingRegistry::new(),
            clients: ClientRegistry::new(),
            consensus,
            commands: CommandTable::new(),
        }
    }

    pub fn with_consensus(mut self, consensus: Arc<dyn Consensus>) -> Self {
        self.consensus = consensus;
        self
    }

    /// Swap the storage engine. It must expose as many databases as the config.
    pub fn with_storage(mut self, storage: Arc<dyn ListStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Hand freshly pushed elements of `key` to clients blocked on it
    pub fn serve_blocked(&self, db: usize, key: &[u8]) -> usize {
        self.blocking
            .serve(self.storage.as_ref(), &self.clients, db, key)
    }
}
