//! Composable filter predicates over messages.
//!
//! A filter is a pure function of a message with no side effects and no
//! dependency on broker state. Filters compose with [`MessageFilter::and`]
//! and [`MessageFilter::or`] to build compound eligibility rules.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::message::{Message, Role};

/// A boolean predicate over a [`Message`], used to decide listener
/// eligibility at dispatch time. Cheap to clone.
#[derive(Clone)]
pub struct MessageFilter {
    predicate: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
}

impl MessageFilter {
    /// Build a filter from an arbitrary predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// A filter that matches every message.
    pub fn any() -> Self {
        Self::new(|_| true)
    }

    /// Evaluate the filter against a message.
    pub fn matches(&self, message: &Message) -> bool {
        (self.predicate)(message)
    }

    /// Both filters must match.
    pub fn and(self, other: MessageFilter) -> Self {
        Self::new(move |m| self.matches(m) && other.matches(m))
    }

    /// Either filter may match.
    pub fn or(self, other: MessageFilter) -> Self {
        Self::new(move |m| self.matches(m) || other.matches(m))
    }

    /// Matches messages sent by a user.
    pub fn user() -> Self {
        Self::role(Role::User)
    }

    /// Matches messages sent by an agent.
    pub fn agent() -> Self {
        Self::role(Role::Agent)
    }

    /// Matches messages sent by the agent factory.
    pub fn agent_factory() -> Self {
        Self::role(Role::AgentFactory)
    }

    /// Matches messages originating server-side: from an agent or the
    /// agent factory.
    pub fn server() -> Self {
        Self::agent().or(Self::agent_factory())
    }

    /// Matches user messages carrying `instruction: "bootstrap_agent"`.
    pub fn user_bootstrap() -> Self {
        Self::user().and(Self::instruction("bootstrap_agent"))
    }

    /// Matches user messages carrying `instruction: "launch_agent"`.
    pub fn user_launch() -> Self {
        Self::user().and(Self::instruction("launch_agent"))
    }

    /// Matches messages whose sender has the given role.
    pub fn role(role: Role) -> Self {
        Self::new(move |m| m.sender_role() == role)
    }

    /// Matches messages whose `instruction` metadata equals `value`.
    ///
    /// A message without an `instruction` key does not match. Absence is a
    /// non-match, never an evaluation failure.
    pub fn instruction(value: impl Into<String>) -> Self {
        let expected = Value::String(value.into());
        Self::new(move |m| m.metadata.get("instruction") == Some(&expected))
    }
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFilter").finish_non_exhaustive()
    }
}
