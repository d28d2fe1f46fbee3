// Configuration - typed settings loaded from a redis.conf-style file,
// a subset of which can be changed at runtime with CONFIG SET

mod parser;

pub use parser::ConfigParser;

use crate::consensus::NodeRole;
use crate::storage::db::match_pattern;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use thiserror::Error;
use tracing::info;

/// Keys CONFIG SET may change on a running server
pub const MUTABLE_KEYS: &[&str] = &["loglevel", "maxclients", "blocking-sweep-interval-ms"];

const LOG_LEVELS: &[&str] = &["debug", "verbose", "notice", "warning"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown option or number of arguments for CONFIG SET - '{0}'")]
    UnknownKey(String),

    #[error("Configuration parameter '{0}' cannot be changed at runtime")]
    ReadOnly(String),

    #[error("Invalid argument '{value}' for CONFIG SET '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("Bad directive at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    pub port: u16,
    /// Number of logical databases
    pub databases: usize,
    /// Maximum number of concurrent clients
    pub maxclients: usize,
    /// debug | verbose | notice | warning
    pub loglevel: String,
    /// How often the timeout reaper runs
    pub blocking_sweep_interval_ms: u64,
    pub use_consensus: bool,
    /// uninitialized | leader | follower
    pub consensus_role: String,
    /// Leader address reported in MOVED replies while following
    pub consensus_leader: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            databases: 16,
            maxclients: 10000,
            loglevel: "notice".to_string(),
            blocking_sweep_interval_ms: 10,
            use_consensus: false,
            consensus_role: "leader".to_string(),
            consensus_leader: String::new(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a file on top of the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str_content(&content)
    }

    pub fn from_str_content(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, value) in ConfigParser::new(content).parse()? {
            config.apply(&key, &value)?;
        }
        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind(mut self, bind: String) -> Self {
        self.bind = bind;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// The consensus role described by `consensus-role` and `consensus-leader`
    pub fn node_role(&self) -> NodeRole {
        NodeRole::parse(&self.consensus_role, &self.consensus_leader).unwrap_or(NodeRole::Leader)
    }

    /// Set one option from its textual form, validating the value
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "bind" => self.bind = value.to_string(),
            "port" => self.port = value.parse().map_err(|_| invalid())?,
            "databases" => {
                let n: usize = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                self.databases = n;
            }
            "maxclients" => {
                let n: usize = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                self.maxclients = n;
            }
            "loglevel" => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid());
                }
                self.loglevel = level;
            }
            "blocking-sweep-interval-ms" => {
                let n: u64 = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                self.blocking_sweep_interval_ms = n;
            }
            "use-consensus" => self.use_consensus = parse_bool(value).ok_or_else(invalid)?,
            "consensus-role" => {
                if NodeRole::parse(value, "").is_none() {
                    return Err(invalid());
                }
                self.consensus_role = value.to_ascii_lowercase();
            }
            "consensus-leader" => self.consensus_leader = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Every option rendered as CONFIG GET shows it, sorted by name
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let value = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => return Vec::new(),
        };
        let mut pairs: Vec<(String, String)> = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Bool(b) => if b { "yes" } else { "no" }.to_string(),
                        other => other.to_string(),
                    };
                    (k, rendered)
                })
                .collect(),
            _ => Vec::new(),
        };
        pairs.sort();
        pairs
    }
}

/// Live configuration shared by the whole server
pub struct ConfigManager {
    config: RwLock<ServerConfig>,
}

impl ConfigManager {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ServerConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Options whose names match a glob pattern
    pub fn get(&self, pattern: &str) -> Vec<(String, String)> {
        let pattern = pattern.to_ascii_lowercase();
        self.read()
            .to_pairs()
            .into_iter()
            .filter(|(key, _)| match_pattern(pattern.as_bytes(), key.as_bytes()))
            .collect()
    }

    /// Change a runtime-mutable option
    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = key.to_ascii_lowercase();
        if !MUTABLE_KEYS.contains(&key.as_str()) {
            // Distinguish known-but-fixed options from typos
            let known = self.read().to_pairs().iter().any(|(k, _)| *k == key);
            return Err(if known {
                ConfigError::ReadOnly(key)
            } else {
                ConfigError::UnknownKey(key)
            });
        }

        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(&key, value)?;
        info!("CONFIG SET {} {}", key, value);
        Ok(())
    }

    pub fn maxclients(&self) -> usize {
        self.read().maxclients
    }

    pub fn blocking_sweep_interval_ms(&self) -> u64 {
        self.read().blocking_sweep_interval_ms
    }

    pub fn use_consensus(&self) -> bool {
        self.read().use_consensus
    }

    pub fn addr(&self) -> String {
        self.read().addr()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Translate a redis-style log level into a tracing filter directive
pub fn tracing_level(loglevel: &str) -> &'static str {
    match loglevel {
        "debug" => "debug",
        "verbose" => "info",
        "warning" => "warn",
        _ => "info",
    }
}
