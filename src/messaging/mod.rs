//! In-process publish/subscribe messaging.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          MessageBroker                           │
//! │                                                                  │
//! │   channel "autogpt"                                              │
//! │   ┌───────────────┐  ┌────────────────┐  ┌──────────────────┐    │
//! │   │ mailbox       │  │ agent factory  │  │ agent            │    │
//! │   │ (server())    │  │ (user_boot..)  │  │ (user_launch())  │    │
//! │   └───────▲───────┘  └────────▲───────┘  └─────────▲────────┘    │
//! │           │ filter match      │                    │             │
//! │           └──────────┬────────┴────────────────────┘             │
//! │                      │ publish (registration order)              │
//! └──────────────────────┼───────────────────────────────────────────┘
//!                        │
//!                  MessageEmitter
//!            (channel + sender identity)
//! ```
//!
//! An emitter publishes a message; the broker evaluates every listener's
//! filter and invokes the matches in registration order. The mailbox
//! listener accumulates server-originated messages into per-sender queues
//! so a synchronous boundary can drain them after triggering a publish.

mod broker;
mod emitter;
mod filters;
mod mailbox;
mod message;

pub use broker::{ListenerFailure, ListenerHandler, MessageBroker, listener_fn};
pub use emitter::MessageEmitter;
pub use filters::MessageFilter;
pub use mailbox::Mailbox;
pub use message::{Message, MessageMetadata, Role, Sender};
