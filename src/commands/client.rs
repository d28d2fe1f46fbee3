// Per-connection command state seen by the dispatcher

use crate::error::CommandError;
use crate::server::ClientId;
use bytes::Bytes;

/// The connection-side state a command runs against
#[derive(Debug, Clone)]
pub struct Client {
    id: ClientId,
    /// Currently selected database
    pub db: usize,
    argv: Vec<Bytes>,
    sub_cmd_name: String,
}

impl Client {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            db: 0,
            argv: Vec::new(),
            sub_cmd_name: String::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Install the next request, clearing per-command state
    pub fn set_argv(&mut self, argv: Vec<Bytes>) {
        self.argv = argv;
        self.sub_cmd_name.clear();
    }

    pub fn argv(&self) -> &[Bytes] {
        &self.argv
    }

    pub fn argc(&self) -> usize {
        self.argv.len()
    }

    /// Argument `index`, empty when absent
    pub fn arg(&self, index: usize) -> &[u8] {
        self.argv.get(index).map_or(&[][..], |arg| &arg[..])
    }

    /// Owned handle to argument `index`
    pub fn arg_bytes(&self, index: usize) -> Bytes {
        self.argv.get(index).cloned().unwrap_or_default()
    }

    /// Lowercased command name
    pub fn cmd_name(&self) -> String {
        String::from_utf8_lossy(self.arg(0)).to_ascii_lowercase()
    }

    /// First key argument
    pub fn key(&self) -> &[u8] {
        self.arg(1)
    }

    pub fn arg_i64(&self, index: usize) -> Result<i64, CommandError> {
        std::str::from_utf8(self.arg(index))
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CommandError::InvalidInt)
    }

    pub fn arg_string(&self, index: usize) -> String {
        String::from_utf8_lossy(self.arg(index)).into_owned()
    }

    pub fn sub_cmd_name(&self) -> &str {
        &self.sub_cmd_name
    }

    pub fn set_sub_cmd_name(&mut self, name: String) {
        self.sub_cmd_name = name;
    }
}
