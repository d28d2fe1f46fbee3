// redis-dispatch: a Redis-compatible command pipeline with blocking list pops

pub mod blocking;
pub mod commands;
pub mod config;
pub mod consensus;
pub mod context;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use blocking::{BlockingRegistry, PopDirection};
pub use commands::{Client, CommandDispatcher, CommandTable, Outcome};
pub use config::{ConfigManager, ServerConfig};
pub use consensus::{Consensus, ConsensusNode, NodeRole};
pub use context::ServerContext;
pub use error::CommandError;
pub use protocol::{RespParser, RespSerializer, RespValue};
pub use server::{ClientRegistry, RedisServer};
pub use storage::{ListStorage, MemoryStorage, StorageError};
