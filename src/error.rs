//! Error types for agentbus.

use uuid::Uuid;

/// Top-level error type for the broker and its surrounding services.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Structural broker errors, surfaced synchronously to the caller that
/// referenced a channel.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("Channel already exists: {channel}")]
    ChannelAlreadyExists { channel: String },

    #[error("Listener {listener} already registered on channel {channel}")]
    DuplicateListener { channel: String, listener: String },

    #[error("Listener registration failed: {reason}")]
    RegistrationFailed { reason: String },
}

/// Runtime failure inside a listener handler. Contained within dispatch and
/// never propagated to the publishing caller.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener execution failed: {reason}")]
    Failed { reason: String },

    #[error("Listener rejected message {message_id}: {reason}")]
    Rejected { message_id: Uuid, reason: String },
}

/// Mailbox queue errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("No messages for sender {sender} within {waited_ms}ms")]
    DrainTimeout { sender: String, waited_ms: u64 },
}

/// Application service errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Message was not accepted for dispatch on channel {channel}")]
    SendRejected { channel: String },

    #[error("No response from {sender} within {timeout_ms}ms")]
    ResponseTimeout { sender: String, timeout_ms: u64 },
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server failed to start: {reason}")]
    StartupFailed { reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
