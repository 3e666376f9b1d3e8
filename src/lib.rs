//! agentbus: an in-process publish/subscribe message broker for agent
//! orchestration.
//!
//! Structured messages flow between a user-facing HTTP boundary and
//! in-process agent / agent-factory workers. Listeners subscribe to named
//! channels with composable filter predicates; a per-sender mailbox bridges
//! request/response semantics over the broker's fan-out delivery.

pub mod config;
pub mod error;
pub mod messaging;
pub mod server;
pub mod service;

pub use config::Config;
pub use error::{
    BrokerError, ConfigError, Error, ListenerError, MailboxError, Result, ServerError,
    ServiceError,
};
pub use messaging::{
    ListenerFailure, ListenerHandler, Mailbox, Message, MessageBroker, MessageEmitter,
    MessageFilter, MessageMetadata, Role, Sender, listener_fn,
};
pub use server::{ApiServer, ApiServerConfig};
pub use service::{AppService, ServiceResponse};
