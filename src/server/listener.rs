// TCP Server listener

use super::connection::Connection;
use crate::blocking::spawn_timeout_reaper;
use crate::commands::CommandDispatcher;
use crate::config::ServerConfig;
use crate::context::ServerContext;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub struct RedisServer {
    ctx: Arc<ServerContext>,
}

impl RedisServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_context(Arc::new(ServerContext::new(config)))
    }

    pub fn with_context(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Bind the configured address and serve forever
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.ctx.config.addr()).await?;
        info!("redis-dispatch listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        spawn_timeout_reaper(Arc::downgrade(&self.ctx));

        loop {
            let (mut socket, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            // maxclients may change at runtime, so it is checked per accept
            if self.ctx.clients.count() >= self.ctx.config.maxclients() {
                warn!("rejecting {}: max number of clients reached", addr);
                let _ = socket
                    .write_all(b"-ERR max number of clients reached\r\n")
                    .await;
                continue;
            }

            let (client_id, replies) = self.ctx.clients.register(addr.to_string());
            info!(client = client_id, "Accepted connection from {}", addr);

            let dispatcher = CommandDispatcher::new(Arc::clone(&self.ctx));
            tokio::spawn(async move {
                let mut connection = Connection::new(socket, client_id, dispatcher, replies);
                if let Err(e) = connection.process().await {
                    error!(client = client_id, "Connection error: {}", e);
                }
                info!(client = client_id, "Connection from {} closed", addr);
            });
        }
    }
}
