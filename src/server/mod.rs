// Server module - TCP server and connection handling

pub mod client_info;
pub mod connection;
pub mod listener;

pub use client_info::{next_client_id, ClientId, ClientInfo, ClientRegistry};
pub use connection::Connection;
pub use listener::RedisServer;
