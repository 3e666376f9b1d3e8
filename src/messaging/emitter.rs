//! Emitters: reusable send handles bound to one channel and one sender.

use std::collections::HashMap;
use std::fmt;

use crate::error::BrokerError;
use crate::messaging::broker::MessageBroker;
use crate::messaging::message::{Message, Sender};

/// A reusable handle bound to a channel and a sender identity.
///
/// Constructs messages with the bound sender attached so callers never
/// repeat sender metadata, then forwards them to the broker. Obtained from
/// [`MessageBroker::emitter`]; holds a clone of the broker handle, not
/// exclusive ownership of broker state.
#[derive(Clone)]
pub struct MessageEmitter {
    channel: String,
    sender: Sender,
    broker: MessageBroker,
}

impl fmt::Debug for MessageEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEmitter")
            .field("channel", &self.channel)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl MessageEmitter {
    pub(crate) fn new(channel: String, sender: Sender, broker: MessageBroker) -> Self {
        Self {
            channel,
            sender,
            broker,
        }
    }

    /// Channel this emitter publishes to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Sender identity stamped onto every message this emitter sends.
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Build a message from content and additional metadata and publish it.
    ///
    /// Returns whatever [`MessageBroker::publish`] returns; no other side
    /// effects.
    pub async fn send_message(
        &self,
        content: HashMap<String, serde_json::Value>,
        additional: HashMap<String, serde_json::Value>,
    ) -> Result<bool, BrokerError> {
        let message = Message::new(content, self.sender.clone()).with_additional(additional);
        self.broker.publish(&self.channel, message).await
    }
}
