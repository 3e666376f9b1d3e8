//! The message broker: named channels, filtered listeners, ordered dispatch.
//!
//! Listeners register on a channel with a [`MessageFilter`]; a published
//! message is delivered to every matching listener in registration order.
//! A failing listener is isolated: its error is logged, optionally forwarded
//! to a failure side channel, and never prevents delivery to the listeners
//! registered after it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::error::{BrokerError, ListenerError};
use crate::messaging::emitter::MessageEmitter;
use crate::messaging::filters::MessageFilter;
use crate::messaging::message::{Message, Role, Sender};

/// A listener handler: an async function of the delivered message.
///
/// Long-running listeners (e.g. launching an agent run loop) should spawn
/// their own background task and return promptly; the broker guarantees
/// invocation order, not handler completion order.
pub type ListenerHandler =
    Arc<dyn Fn(Message) -> BoxFuture<'static, Result<(), ListenerError>> + Send + Sync>;

/// Wrap an async closure as a [`ListenerHandler`].
pub fn listener_fn<F, Fut>(f: F) -> ListenerHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// Record of a listener failure, reported on the failure side channel.
#[derive(Debug, Clone)]
pub struct ListenerFailure {
    /// Channel the message was published on.
    pub channel: String,
    /// Name of the failing listener.
    pub listener: String,
    /// Id of the message being dispatched.
    pub message_id: Uuid,
    /// Human-readable failure reason.
    pub reason: String,
}

/// A (handler, filter) pair registered on a channel.
#[derive(Clone)]
struct ListenerRegistration {
    name: String,
    handler: ListenerHandler,
    filter: MessageFilter,
}

/// Per-channel listener list. Registration order is dispatch order.
#[derive(Default)]
struct Channel {
    listeners: Vec<ListenerRegistration>,
}

struct BrokerInner {
    channels: RwLock<HashMap<String, Channel>>,
    failure_tx: RwLock<Option<mpsc::UnboundedSender<ListenerFailure>>>,
}

/// In-process publish/subscribe message broker.
///
/// Cheap to clone; all clones share the same channel registry. Channels must
/// be created explicitly before listeners register or messages publish.
#[derive(Clone)]
pub struct MessageBroker {
    inner: Arc<BrokerInner>,
}

impl MessageBroker {
    /// Create a new broker with no channels.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                channels: RwLock::new(HashMap::new()),
                failure_tx: RwLock::new(None),
            }),
        }
    }

    /// Subscribe to listener failure reports.
    ///
    /// Dispatch never surfaces handler errors to the publishing caller; this
    /// receiver is the side channel where they land. Replaces any previous
    /// subscription.
    pub async fn failure_reports(&self) -> mpsc::UnboundedReceiver<ListenerFailure> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.failure_tx.write().await = Some(tx);
        rx
    }

    /// Register a new empty channel.
    ///
    /// Strict semantics: creating a channel that already exists fails with
    /// [`BrokerError::ChannelAlreadyExists`].
    pub async fn create_channel(&self, name: impl Into<String>) -> Result<(), BrokerError> {
        let name = name.into();
        let mut channels = self.inner.channels.write().await;
        if channels.contains_key(&name) {
            return Err(BrokerError::ChannelAlreadyExists { channel: name });
        }
        tracing::debug!(channel = %name, "Created message channel");
        channels.insert(name, Channel::default());
        Ok(())
    }

    /// List the names of all registered channels.
    pub async fn channel_names(&self) -> Vec<String> {
        self.inner.channels.read().await.keys().cloned().collect()
    }

    /// Register a listener on a channel.
    ///
    /// Listeners are invoked in registration order for each matching publish
    /// and live for the lifetime of the broker. The name exists for logging
    /// and failure reports and must be unique per channel.
    pub async fn register_listener(
        &self,
        channel: &str,
        name: impl Into<String>,
        handler: ListenerHandler,
        filter: MessageFilter,
    ) -> Result<(), BrokerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BrokerError::RegistrationFailed {
                reason: "Listener name cannot be empty".to_string(),
            });
        }

        let mut channels = self.inner.channels.write().await;
        let entry = channels
            .get_mut(channel)
            .ok_or_else(|| BrokerError::ChannelNotFound {
                channel: channel.to_string(),
            })?;

        if entry.listeners.iter().any(|l| l.name == name) {
            return Err(BrokerError::DuplicateListener {
                channel: channel.to_string(),
                listener: name,
            });
        }

        tracing::debug!(channel, listener = %name, "Registered listener");
        entry.listeners.push(ListenerRegistration {
            name,
            handler,
            filter,
        });
        Ok(())
    }

    /// Get a reusable emitter bound to a channel and sender identity.
    pub async fn emitter(
        &self,
        channel: &str,
        sender_name: impl Into<String>,
        sender_role: Role,
    ) -> Result<MessageEmitter, BrokerError> {
        if !self.inner.channels.read().await.contains_key(channel) {
            return Err(BrokerError::ChannelNotFound {
                channel: channel.to_string(),
            });
        }
        Ok(MessageEmitter::new(
            channel.to_string(),
            Sender::new(sender_name, sender_role),
            self.clone(),
        ))
    }

    /// Publish a message to a channel.
    ///
    /// Evaluates every registered listener's filter against the message and
    /// invokes the matches sequentially in registration order. Returns
    /// `Ok(true)` once dispatch was attempted; handler failures do not affect
    /// the return value. Fails with [`BrokerError::ChannelNotFound`] before
    /// invoking anything if the channel does not exist.
    ///
    /// The listener list is snapshotted before dispatch and no lock is held
    /// across handler invocation, so a handler may itself publish (to this
    /// or another channel) without deadlocking the broker.
    pub async fn publish(&self, channel: &str, message: Message) -> Result<bool, BrokerError> {
        let listeners = {
            let channels = self.inner.channels.read().await;
            let entry = channels
                .get(channel)
                .ok_or_else(|| BrokerError::ChannelNotFound {
                    channel: channel.to_string(),
                })?;
            entry.listeners.clone()
        };

        tracing::debug!(
            channel,
            message_id = %message.id,
            sender = message.sender_name(),
            listeners = listeners.len(),
            "Dispatching message"
        );

        for registration in &listeners {
            if !registration.filter.matches(&message) {
                continue;
            }
            self.invoke(channel, registration, message.clone()).await;
        }

        Ok(true)
    }

    /// Invoke one listener, containing any error or panic.
    async fn invoke(&self, channel: &str, registration: &ListenerRegistration, message: Message) {
        let message_id = message.id;
        let fut = (registration.handler)(message);

        // Spawned so that a panicking handler surfaces as a join error here
        // instead of unwinding through the publishing caller.
        match tokio::spawn(fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.report_failure(channel, &registration.name, message_id, e.to_string())
                    .await;
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "listener panicked".to_string()
                } else {
                    join_err.to_string()
                };
                self.report_failure(channel, &registration.name, message_id, reason)
                    .await;
            }
        }
    }

    async fn report_failure(&self, channel: &str, listener: &str, message_id: Uuid, reason: String) {
        tracing::warn!(channel, listener, %message_id, reason, "Listener failed during dispatch");
        if let Some(tx) = self.inner.failure_tx.read().await.as_ref() {
            let _ = tx.send(ListenerFailure {
                channel: channel.to_string(),
                listener: listener.to_string(),
                message_id,
                reason,
            });
        }
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::Sender;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user_message() -> Message {
        Message::new(HashMap::new(), Sender::new("test-user", Role::User))
    }

    fn counting_listener(counter: Arc<AtomicUsize>) -> ListenerHandler {
        listener_fn(move |_msg| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_create_channel_twice_is_an_error() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let err = broker.create_channel("autogpt").await.unwrap_err();
        assert!(matches!(err, BrokerError::ChannelAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_register_listener_on_missing_channel_fails() {
        let broker = MessageBroker::new();
        let err = broker
            .register_listener(
                "nope",
                "listener",
                listener_fn(|_| async { Ok(()) }),
                MessageFilter::any(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::ChannelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_listener_name_rejected() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let handler = listener_fn(|_| async { Ok(()) });
        broker
            .register_listener("autogpt", "dup", handler.clone(), MessageFilter::any())
            .await
            .unwrap();
        let err = broker
            .register_listener("autogpt", "dup", handler, MessageFilter::any())
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::DuplicateListener { .. }));
    }

    #[tokio::test]
    async fn test_empty_listener_name_rejected() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let err = broker
            .register_listener(
                "autogpt",
                "",
                listener_fn(|_| async { Ok(()) }),
                MessageFilter::any(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::RegistrationFailed { .. }));
    }

    #[tokio::test]
    async fn test_publish_to_missing_channel_invokes_nothing() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        broker
            .register_listener(
                "autogpt",
                "spy",
                counting_listener(count.clone()),
                MessageFilter::any(),
            )
            .await
            .unwrap();

        let err = broker.publish("other", user_message()).await.unwrap_err();
        assert!(matches!(err, BrokerError::ChannelNotFound { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_follows_registration_order() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["l1", "l2", "l3"] {
            let order = order.clone();
            broker
                .register_listener(
                    "autogpt",
                    name,
                    listener_fn(move |_msg| {
                        let order = order.clone();
                        async move {
                            order.lock().unwrap().push(name);
                            Ok(())
                        }
                    }),
                    MessageFilter::any(),
                )
                .await
                .unwrap();
        }

        assert!(broker.publish("autogpt", user_message()).await.unwrap());
        assert_eq!(*order.lock().unwrap(), vec!["l1", "l2", "l3"]);
    }

    #[tokio::test]
    async fn test_filter_gates_delivery() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();

        let user_count = Arc::new(AtomicUsize::new(0));
        let server_count = Arc::new(AtomicUsize::new(0));
        broker
            .register_listener(
                "autogpt",
                "users",
                counting_listener(user_count.clone()),
                MessageFilter::user(),
            )
            .await
            .unwrap();
        broker
            .register_listener(
                "autogpt",
                "servers",
                counting_listener(server_count.clone()),
                MessageFilter::server(),
            )
            .await
            .unwrap();

        broker.publish("autogpt", user_message()).await.unwrap();
        assert_eq!(user_count.load(Ordering::SeqCst), 1);
        assert_eq!(server_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_later_listeners() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let mut failures = broker.failure_reports().await;

        broker
            .register_listener(
                "autogpt",
                "broken",
                listener_fn(|msg| async move {
                    Err(ListenerError::Rejected {
                        message_id: msg.id,
                        reason: "boom".to_string(),
                    })
                }),
                MessageFilter::any(),
            )
            .await
            .unwrap();

        let spy = Arc::new(AtomicUsize::new(0));
        broker
            .register_listener("autogpt", "spy", counting_listener(spy.clone()), MessageFilter::any())
            .await
            .unwrap();

        assert!(broker.publish("autogpt", user_message()).await.unwrap());
        assert_eq!(spy.load(Ordering::SeqCst), 1);

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.listener, "broken");
        assert_eq!(failure.channel, "autogpt");
        assert!(failure.reason.contains("boom"));
    }

    #[tokio::test]
    async fn test_panicking_listener_is_contained() {
        let broker = MessageBroker::new();
        broker.create_channel("autogpt").await.unwrap();
        let mut failures = broker.failure_reports().await;

        broker
            .register_listener(
                "autogpt",
                "panicker",
                listener_fn(|_msg| async { panic!("listener blew up") }),
                MessageFilter::any(),
            )
            .await
            .unwrap();

        let spy = Arc::new(AtomicUsize::new(0));
        broker
            .register_listener("autogpt", "spy", counting_listener(spy.clone()), MessageFilter::any())
            .await
            .unwrap();

        assert!(broker.publish("autogpt", user_message()).await.unwrap());
        assert_eq!(spy.load(Ordering::SeqCst), 1);

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.listener, "panicker");
        assert!(failure.reason.contains("panicked"));
    }

    #[tokio::test]
    async fn test_nested_publish_from_inside_a_handler() {
        let broker = MessageBroker::new();
        broker.create_channel("requests").await.unwrap();
        broker.create_channel("responses").await.unwrap();

        let responses = Arc::new(AtomicUsize::new(0));
        broker
            .register_listener(
                "responses",
                "response-counter",
                counting_listener(responses.clone()),
                MessageFilter::any(),
            )
            .await
            .unwrap();

        let nested = broker.clone();
        broker
            .register_listener(
                "requests",
                "responder",
                listener_fn(move |_msg| {
                    let broker = nested.clone();
                    async move {
                        let reply = Message::new(
                            HashMap::new(),
                            Sender::new("autogpt-agent", Role::Agent),
                        );
                        broker
                            .publish("responses", reply)
                            .await
                            .map_err(|e| ListenerError::Failed {
                                reason: e.to_string(),
                            })?;
                        Ok(())
                    }
                }),
                MessageFilter::any(),
            )
            .await
            .unwrap();

        assert!(broker.publish("requests", user_message()).await.unwrap());
        assert_eq!(responses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_names() {
        let broker = MessageBroker::new();
        broker.create_channel("a").await.unwrap();
        broker.create_channel("b").await.unwrap();
        let mut names = broker.channel_names().await;
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_emitter_requires_existing_channel() {
        let broker = MessageBroker::new();
        let err = broker
            .emitter("missing", "autogpt-user", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::ChannelNotFound { .. }));
    }
}
