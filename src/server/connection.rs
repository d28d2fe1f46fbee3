// Connection handler

use crate::commands::{Client, CommandDispatcher, Outcome};
use crate::protocol::{RespParser, RespSerializer, RespValue};
use crate::server::ClientId;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
    client: Client,
    dispatcher: CommandDispatcher,
    /// Deferred replies for this client (wakes and timeouts)
    replies: UnboundedReceiver<RespValue>,
}

impl Connection {
    pub fn new(
        socket: TcpStream,
        client_id: ClientId,
        dispatcher: CommandDispatcher,
        replies: UnboundedReceiver<RespValue>,
    ) -> Self {
        Self {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4096),
            client: Client::new(client_id),
            dispatcher,
            replies,
        }
    }

    pub fn id(&self) -> ClientId {
        self.client.id()
    }

    /// Serve requests until the peer goes away.
    ///
    /// Always unregisters the client and drops any wait it still has queued.
    pub async fn process(&mut self) -> anyhow::Result<()> {
        let result = self.serve().await;
        let ctx = self.dispatcher.context();
        if ctx.blocking.unblock_client(self.client.id()) {
            debug!(client = self.client.id(), "dropped wait of closed connection");
        }
        ctx.clients.unregister(self.client.id());
        result
    }

    async fn serve(&mut self) -> anyhow::Result<()> {
        loop {
            match RespParser::next_command(&mut self.buffer) {
                Ok(Some(argv)) => {
                    if !self.handle_command(argv).await? {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    if self.read_more().await? == 0 {
                        if self.buffer.is_empty() {
                            return Ok(());
                        }
                        return Err(anyhow::anyhow!("Connection reset by peer"));
                    }
                }
                Err(e) => {
                    warn!(client = self.client.id(), "protocol error: {}", e);
                    self.write_response(&RespValue::Error(format!("ERR {}", e)))
                        .await?;
                    return Err(e.into());
                }
            }
        }
    }

    /// Run one request. Returns false once the peer has disconnected.
    async fn handle_command(&mut self, argv: Vec<Bytes>) -> anyhow::Result<bool> {
        let ctx = self.dispatcher.context();
        let cmd = argv
            .first()
            .map(|name| String::from_utf8_lossy(name).to_ascii_lowercase())
            .unwrap_or_default();
        ctx.clients.mark_activity(self.client.id(), cmd, self.client.db);

        self.client.set_argv(argv);
        let response = match self.dispatcher.dispatch(&mut self.client) {
            Outcome::Reply(value) => value,
            Outcome::Blocked => match self.wait_for_reply().await? {
                Some(value) => value,
                None => return Ok(false),
            },
        };
        self.write_response(&response).await?;
        Ok(true)
    }

    /// Park until a wake or a timeout reply arrives.
    ///
    /// Bytes the peer sends meanwhile are buffered and processed afterwards.
    /// Returns `None` if the peer closes the connection first, after leaving
    /// every wait queue.
    async fn wait_for_reply(&mut self) -> anyhow::Result<Option<RespValue>> {
        loop {
            tokio::select! {
                reply = self.replies.recv() => return Ok(reply),
                read = self.stream.get_mut().read_buf(&mut self.buffer) => {
                    if read? == 0 {
                        debug!(client = self.client.id(), "peer closed while blocked");
                        self.dispatcher.context().blocking.unblock_client(self.client.id());
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn read_more(&mut self) -> anyhow::Result<usize> {
        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        Ok(n)
    }

    async fn write_response(&mut self, response: &RespValue) -> anyhow::Result<()> {
        let mut out = BytesMut::new();
        RespSerializer::write_value(&mut out, response);
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
