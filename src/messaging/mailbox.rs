//! Per-sender mailbox queues.
//!
//! The mailbox is a standing listener that accumulates delivered messages
//! into FIFO queues keyed by sender name. An external synchronous boundary
//! (e.g. an HTTP handler that just triggered a publish) drains a sender's
//! queue to collect responses, bridging request/response semantics over the
//! broker's fan-out delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};

use crate::error::MailboxError;
use crate::messaging::broker::{ListenerHandler, listener_fn};
use crate::messaging::message::Message;

struct MailboxInner {
    /// Sender name -> queued messages, in append (publish) order.
    queues: RwLock<HashMap<String, Vec<Message>>>,
    /// Wakes drain_timeout waiters when a message is appended.
    notify: Notify,
}

/// Owned mailbox component with per-sender FIFO queues.
///
/// Queues are created lazily on first append for a sender name and live for
/// the lifetime of the mailbox. Cheap to clone; clones share the queues.
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<MailboxInner>,
}

impl Mailbox {
    /// Create a new empty mailbox.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MailboxInner {
                queues: RwLock::new(HashMap::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Build the broker listener that feeds this mailbox.
    ///
    /// Register it on a channel with whatever filter decides which messages
    /// should be queued (typically [`MessageFilter::server`]).
    ///
    /// [`MessageFilter::server`]: crate::messaging::MessageFilter::server
    pub fn listener(&self) -> ListenerHandler {
        let inner = self.inner.clone();
        listener_fn(move |message: Message| {
            let inner = inner.clone();
            async move {
                let sender = message.sender_name().to_string();
                let mut queues = inner.queues.write().await;
                queues.entry(sender).or_default().push(message);
                drop(queues);
                inner.notify.notify_waiters();
                Ok(())
            }
        })
    }

    /// Atomically take and clear all messages queued under a sender name.
    ///
    /// Returns the messages in append order, or an empty vec if nothing is
    /// queued.
    pub async fn drain(&self, sender_name: &str) -> Vec<Message> {
        self.inner
            .queues
            .write()
            .await
            .remove(sender_name)
            .unwrap_or_default()
    }

    /// Drain a sender's queue, waiting up to `timeout` for at least one
    /// message to arrive.
    ///
    /// This is the explicit wait that replaces any assumption of same-tick
    /// delivery: the caller publishes, then waits here for the responding
    /// party's messages. The wait does not block the broker; dispatch keeps
    /// running while this future is pending.
    pub async fn drain_timeout(
        &self,
        sender_name: &str,
        timeout: Duration,
    ) -> Result<Vec<Message>, MailboxError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for wakeups before checking, so an append between the
            // check and the await is not lost.
            let notified = self.inner.notify.notified();

            let drained = self.drain(sender_name).await;
            if !drained.is_empty() {
                return Ok(drained);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // A message may have landed right at the deadline.
                let drained = self.drain(sender_name).await;
                if !drained.is_empty() {
                    return Ok(drained);
                }
                return Err(MailboxError::DrainTimeout {
                    sender: sender_name.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Number of messages currently queued for a sender.
    pub async fn pending(&self, sender_name: &str) -> usize {
        self.inner
            .queues
            .read()
            .await
            .get(sender_name)
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
