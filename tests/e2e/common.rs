// E2E Test Framework - Common utilities for end-to-end testing
//
// Starts an in-process server on an ephemeral port and talks to it
// through the redis crate.

#![allow(dead_code)]

use redis::{Client, RedisResult};
use redis_dispatch::{RedisServer, ServerConfig, ServerContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A test server instance
pub struct TestRedisServer {
    handle: JoinHandle<()>,
    pub port: u16,
    pub client: Client,
    pub ctx: Arc<ServerContext>,
}

impl TestRedisServer {
    pub async fn start() -> Self {
        Self::start_with_config(ServerConfig::default()).await
    }

    pub async fn start_with_config(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let port = listener.local_addr().expect("no local addr").port();

        let server = RedisServer::new(config.with_port(port));
        let ctx = Arc::clone(server.context());
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let client = Client::open(format!("redis://127.0.0.1:{}", port))
            .expect("Failed to create Redis client");

        Self {
            handle,
            port,
            client,
            ctx,
        }
    }

    /// Get an async connection to the server
    pub async fn get_async_connection(&self) -> RedisResult<redis::aio::Connection> {
        self.client.get_async_connection().await
    }

    /// Flush all data from the server
    pub async fn flush_all(&self) -> RedisResult<()> {
        let mut conn = self.get_async_connection().await?;
        redis::cmd("FLUSHALL").query_async(&mut conn).await
    }

    /// Wait until `count` clients are parked in the wait registry
    pub async fn wait_blocked(&self, count: usize) {
        for _ in 0..200 {
            if self.ctx.blocking.blocked_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} blocked clients, found {}",
            count,
            self.ctx.blocking.blocked_count()
        );
    }

    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// Helper function to execute a command and return the result
pub async fn exec_cmd<T: redis::FromRedisValue>(
    conn: &mut redis::aio::Connection,
    cmd: &str,
    args: &[&str],
) -> RedisResult<T> {
    let mut command = redis::cmd(cmd);
    for arg in args {
        command.arg(*arg);
    }
    command.query_async(conn).await
}
