//! Message and sender value objects.
//!
//! Messages are immutable once published: every listener on a dispatch
//! observes the same content and metadata.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a message sender. Closed set; exists purely so filters can
/// route by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user at the external boundary.
    User,
    /// A running agent.
    Agent,
    /// The factory that bootstraps new agents.
    AgentFactory,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Agent => write!(f, "agent"),
            Self::AgentFactory => write!(f, "agent_factory"),
        }
    }
}

/// Identity of a message sender.
///
/// `name` is unique per logical sender instance and keys the mailbox queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub name: String,
    pub role: Role,
}

impl Sender {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// Metadata attached to every message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Who sent the message.
    pub sender: Sender,
    /// Arbitrary additional metadata, e.g. `{"instruction": "bootstrap_agent"}`.
    #[serde(default)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl MessageMetadata {
    /// Look up a key in the additional metadata. Absent keys are simply
    /// `None`; filter evaluation must never panic on a missing key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.additional.get(key)
    }
}

/// A message routed through the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// The payload: string keys to arbitrary JSON values.
    pub content: HashMap<String, serde_json::Value>,
    /// Sender identity and additional metadata.
    pub metadata: MessageMetadata,
    /// When the message was constructed.
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message with auto-generated id and current timestamp.
    pub fn new(content: HashMap<String, serde_json::Value>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            metadata: MessageMetadata {
                sender,
                additional: HashMap::new(),
            },
            sent_at: Utc::now(),
        }
    }

    /// Attach additional metadata to this message.
    pub fn with_additional(mut self, additional: HashMap<String, serde_json::Value>) -> Self {
        self.metadata.additional = additional;
        self
    }

    /// Name of the sender, used to key mailbox queues.
    pub fn sender_name(&self) -> &str {
        &self.metadata.sender.name
    }

    /// Role of the sender.
    pub fn sender_role(&self) -> Role {
        self.metadata.sender.role
    }
}
