// Consensus handle - role and leader address as seen by the dispatcher

use std::sync::{PoisonError, RwLock};
use tracing::info;

/// What the dispatcher needs to know about the consensus layer
pub trait Consensus: Send + Sync {
    fn is_initialized(&self) -> bool;
    fn is_leader(&self) -> bool;
    /// Address writes should be redirected to; empty when unknown
    fn leader_address(&self) -> String;
}

/// Node role in the replicated group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    /// Consensus enabled but the node has not joined a group yet
    Uninitialized,
    Leader,
    Follower {
        /// host:port of the current leader
        leader: String,
    },
}

impl NodeRole {
    /// Build a role from the `consensus-role` / `consensus-leader` settings
    pub fn parse(role: &str, leader: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "uninitialized" => Some(NodeRole::Uninitialized),
            "leader" => Some(NodeRole::Leader),
            "follower" => Some(NodeRole::Follower {
                leader: leader.to_string(),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeRole::Uninitialized => "uninitialized",
            NodeRole::Leader => "leader",
            NodeRole::Follower { .. } => "follower",
        }
    }
}

/// Role state behind a lock, updated by whatever drives elections
pub struct ConsensusNode {
    role: RwLock<NodeRole>,
}

impl ConsensusNode {
    pub fn new(role: NodeRole) -> Self {
        Self {
            role: RwLock::new(role),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn become_leader(&self) {
        self.set_role(NodeRole::Leader);
    }

    pub fn follow(&self, leader: impl Into<String>) {
        self.set_role(NodeRole::Follower {
            leader: leader.into(),
        });
    }

    pub fn reset(&self) {
        self.set_role(NodeRole::Uninitialized);
    }

    fn set_role(&self, role: NodeRole) {
        let mut current = self.role.write().unwrap_or_else(PoisonError::into_inner);
        if *current != role {
            info!("Consensus role changed: {:?} -> {:?}", *current, role);
            *current = role;
        }
    }
}

impl Default for ConsensusNode {
    fn default() -> Self {
        Self::new(NodeRole::Leader)
    }
}

impl Consensus for ConsensusNode {
    fn is_initialized(&self) -> bool {
        !matches!(self.role(), NodeRole::Uninitialized)
    }

    fn is_leader(&self) -> bool {
        matches!(self.role(), NodeRole::Leader)
    }

    fn leader_address(&self) -> String {
        match self.role() {
            NodeRole::Follower { leader } => leader,
            _ => String::new(),
        }
    }
}
