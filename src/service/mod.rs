//! Application service: wires the broker, mailbox, and collaborator
//! listeners, and exposes typed request/response operations to the HTTP
//! boundary.
//!
//! The service owns one primary channel. At construction it registers the
//! standing mailbox listener (filtered to server-originated messages);
//! the agent-factory and agent collaborators are injected afterwards with
//! [`AppService::register_factory`] / [`AppService::register_agent`], bound
//! to the user-bootstrap and user-launch filters respectively.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::{MailboxError, ServiceError};
use crate::messaging::{
    ListenerHandler, Mailbox, Message, MessageBroker, MessageEmitter, MessageFilter, Role,
};

/// Listener name for the standing mailbox queue listener.
const MAILBOX_LISTENER: &str = "mailbox";
/// Listener name for the injected agent-factory collaborator.
const FACTORY_LISTENER: &str = "agent-factory";
/// Listener name for the injected agent collaborator.
const AGENT_LISTENER: &str = "agent";

/// Typed outcome of a service operation.
///
/// Replaces ad-hoc status-code plumbing: `accepted` reports whether the
/// publish was dispatched, `messages` carries whatever the responding
/// collaborator queued in the mailbox.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceResponse {
    pub accepted: bool,
    pub messages: Vec<Message>,
}

/// The user-facing orchestration service.
pub struct AppService {
    broker: MessageBroker,
    mailbox: Mailbox,
    user_emitter: MessageEmitter,
    channel: String,
    factory_sender: String,
    agent_sender: String,
    response_timeout: Duration,
}

impl AppService {
    /// Build the service: create the primary channel, register the mailbox
    /// listener, and bind the user emitter.
    pub async fn new(config: &Config) -> Result<Self, ServiceError> {
        let broker = MessageBroker::new();
        broker.create_channel(&config.channel).await?;

        let mailbox = Mailbox::new();
        broker
            .register_listener(
                &config.channel,
                MAILBOX_LISTENER,
                mailbox.listener(),
                MessageFilter::server(),
            )
            .await?;

        let user_emitter = broker
            .emitter(
                &config.channel,
                format!("{}-user", config.channel),
                Role::User,
            )
            .await?;

        Ok(Self {
            broker,
            mailbox,
            user_emitter,
            channel: config.channel.clone(),
            factory_sender: format!("{}-agent-factory", config.channel),
            agent_sender: format!("{}-agent", config.channel),
            response_timeout: config.response_timeout,
        })
    }

    /// Register the agent-factory collaborator. Its handler fires on user
    /// messages carrying `instruction: "bootstrap_agent"`.
    pub async fn register_factory(&self, handler: ListenerHandler) -> Result<(), ServiceError> {
        self.broker
            .register_listener(
                &self.channel,
                FACTORY_LISTENER,
                handler,
                MessageFilter::user_bootstrap(),
            )
            .await?;
        Ok(())
    }

    /// Register the agent collaborator. Its handler fires on user messages
    /// carrying `instruction: "launch_agent"`.
    pub async fn register_agent(&self, handler: ListenerHandler) -> Result<(), ServiceError> {
        self.broker
            .register_listener(
                &self.channel,
                AGENT_LISTENER,
                handler,
                MessageFilter::user_launch(),
            )
            .await?;
        Ok(())
    }

    /// The shared broker handle, for collaborators that need emitters of
    /// their own.
    pub fn broker(&self) -> MessageBroker {
        self.broker.clone()
    }

    /// The shared mailbox.
    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    /// Primary channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Sender name the agent factory replies under.
    pub fn factory_sender(&self) -> &str {
        &self.factory_sender
    }

    /// Sender name the agent replies under.
    pub fn agent_sender(&self) -> &str {
        &self.agent_sender
    }

    /// Publish a bootstrap request and collate the agent factory's
    /// responses.
    pub async fn bootstrap_agent(
        &self,
        content: HashMap<String, serde_json::Value>,
        mut additional: HashMap<String, serde_json::Value>,
    ) -> Result<ServiceResponse, ServiceError> {
        additional.insert(
            "instruction".to_string(),
            serde_json::Value::String("bootstrap_agent".to_string()),
        );
        self.send_as_user(content, additional).await?;

        let messages = self.collect_responses(&self.factory_sender).await?;
        Ok(ServiceResponse {
            accepted: true,
            messages,
        })
    }

    /// Publish a launch request. Launching is fire-and-forget: the agent's
    /// run loop reports through the mailbox later.
    pub async fn launch_agent(
        &self,
        content: HashMap<String, serde_json::Value>,
        mut additional: HashMap<String, serde_json::Value>,
    ) -> Result<ServiceResponse, ServiceError> {
        additional.insert(
            "instruction".to_string(),
            serde_json::Value::String("launch_agent".to_string()),
        );
        self.send_as_user(content, additional).await?;

        Ok(ServiceResponse {
            accepted: true,
            messages: Vec::new(),
        })
    }

    /// Forward user feedback to the running agent and wait for its reply.
    pub async fn give_agent_feedback(
        &self,
        content: HashMap<String, serde_json::Value>,
    ) -> Result<ServiceResponse, ServiceError> {
        self.send_as_user(content, HashMap::new()).await?;

        let messages = self.collect_responses(&self.agent_sender).await?;
        Ok(ServiceResponse {
            accepted: true,
            messages,
        })
    }

    /// Drain any messages a sender has already queued, without waiting.
    pub async fn drain(&self, sender_name: &str) -> Vec<Message> {
        self.mailbox.drain(sender_name).await
    }

    async fn send_as_user(
        &self,
        content: HashMap<String, serde_json::Value>,
        additional: HashMap<String, serde_json::Value>,
    ) -> Result<(), ServiceError> {
        let accepted = self.user_emitter.send_message(content, additional).await?;
        if !accepted {
            return Err(ServiceError::SendRejected {
                channel: self.channel.clone(),
            });
        }
        Ok(())
    }

    async fn collect_responses(&self, sender: &str) -> Result<Vec<Message>, ServiceError> {
        match self
            .mailbox
            .drain_timeout(sender, self.response_timeout)
            .await
        {
            Ok(messages) => Ok(messages),
            Err(MailboxError::DrainTimeout { sender, waited_ms }) => {
                tracing::warn!(sender = %sender, waited_ms, "Timed out waiting for responses");
                Err(ServiceError::ResponseTimeout {
                    sender,
                    timeout_ms: waited_ms,
                })
            }
        }
    }
}
