//! Conversation state and the submission lifecycle.
//!
//! [`ConversationStore`] is the only owner of mutable conversation state. It is
//! single-threaded (`!Send`): state lives behind `Rc<RefCell<..>>` and no borrow
//! is held across an `.await`. Submissions are serialized by the `pending`
//! flag rather than a lock, so a second submission while one is outstanding is
//! rejected without touching state.
//!
//! Views observe the store by subscribing to [`StoreEvent`]s. Events are
//! delivered in the order the state changed, even when a listener submits from
//! inside a notification.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::ChatClient;
use crate::classify::classify_reply;
use crate::client::ChatTransport;
use crate::error::{Error, Result};
use crate::observability::{
    STORE_DETACHED, STORE_DOCUMENT_LINKS, STORE_FAILURES, STORE_REJECTED_BUSY,
    STORE_REJECTED_EMPTY, STORE_REPLIES, STORE_SUBMISSIONS,
};
use crate::types::{Message, Sender};

/// Snapshot of the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    history: Vec<Message>,
    pending: bool,
}

impl ConversationState {
    /// The transcript, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// True iff exactly one request is outstanding.
    pub fn pending(&self) -> bool {
        self.pending
    }
}

/// A change to the store, delivered to subscribers after it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A message was appended at `index`.
    HistoryAppended {
        /// Position of the new message in the history.
        index: usize,
        /// The appended message.
        message: Message,
    },
    /// The pending flag flipped.
    PendingChanged {
        /// The new value of the flag.
        pending: bool,
    },
    /// The input buffer was emptied after a request settled.
    DraftCleared,
}

/// Handle returned by [`ConversationStore::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Aggregated stats for a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Messages in the transcript.
    pub message_count: usize,
    /// Messages typed by the user.
    pub user_messages: usize,
    /// Replies from the chatbot.
    pub bot_messages: usize,
    /// Replies that were classified as document links.
    pub document_links: usize,
    /// Requests that ended without a reply.
    pub failed_requests: u64,
    /// Whether a request is outstanding.
    pub pending: bool,
}

type Listener = Rc<RefCell<dyn FnMut(&StoreEvent)>>;

#[derive(Default)]
struct Inner {
    state: ConversationState,
    draft: String,
    failed_requests: u64,
}

#[derive(Default)]
struct Shared {
    inner: RefCell<Inner>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_subscription: Cell<u64>,
    queue: RefCell<VecDeque<StoreEvent>>,
    notifying: Cell<bool>,
}

impl Shared {
    /// Queue `events` and deliver everything queued, oldest first.
    ///
    /// Listeners may subscribe, unsubscribe or submit while being called. A
    /// nested call only queues: the outermost call delivers, so every listener
    /// sees events in the order the state changed.
    fn notify(&self, events: impl IntoIterator<Item = StoreEvent>) {
        self.queue.borrow_mut().extend(events);
        if self.notifying.replace(true) {
            return;
        }
        loop {
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            let listeners: Vec<Listener> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            for listener in listeners {
                if let Ok(mut listener) = listener.try_borrow_mut() {
                    (&mut *listener)(&event);
                }
            }
        }
        self.notifying.set(false);
    }

    /// Close out the outstanding request, appending `reply` if there is one.
    fn settle(&self, reply: Option<Message>) {
        let appended = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.pending {
                return;
            }
            let appended = reply.map(|message| {
                inner.state.history.push(message.clone());
                (inner.state.history.len() - 1, message)
            });
            if appended.is_none() {
                inner.failed_requests += 1;
            }
            inner.state.pending = false;
            inner.draft.clear();
            appended
        };
        let appended =
            appended.map(|(index, message)| StoreEvent::HistoryAppended { index, message });
        self.notify(appended.into_iter().chain([
            StoreEvent::PendingChanged { pending: false },
            StoreEvent::DraftCleared,
        ]));
    }
}

/// Holds the ordered transcript and the pending flag for one session.
pub struct ConversationStore<T: ChatTransport = ChatClient> {
    transport: Rc<T>,
    shared: Rc<Shared>,
}

impl<T: ChatTransport> ConversationStore<T> {
    /// Creates an empty conversation that talks through `transport`.
    pub fn new(transport: T) -> Self {
        Self::with_transport(Rc::new(transport))
    }

    /// Creates an empty conversation sharing an existing transport.
    pub fn with_transport(transport: Rc<T>) -> Self {
        Self {
            transport,
            shared: Rc::new(Shared::default()),
        }
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submits `raw_input` and waits for the reply.
    ///
    /// Returns the appended bot message, or `Ok(None)` if the store was
    /// dropped before the reply arrived. Submission rejections
    /// ([`Error::Validation`], [`Error::Busy`]) leave the store untouched.
    /// Transport errors are logged and returned after the store has been
    /// settled: pending is cleared, the input buffer is cleared and the user
    /// message stays without a reply.
    pub async fn submit(&self, raw_input: &str) -> Result<Option<Message>> {
        self.begin(raw_input)?.finish().await
    }

    /// Submits whatever is in the input buffer.
    ///
    /// This is the same operation as [`submit`](Self::submit); the buffer is
    /// read, not cleared, until the request settles.
    pub async fn submit_draft(&self) -> Result<Option<Message>> {
        let draft = self.draft();
        self.submit(&draft).await
    }

    /// Starts a submission without waiting for the reply.
    ///
    /// On success the user message has been appended and `pending` is set
    /// before this returns; the request is sent when the returned
    /// [`InFlight`] is finished.
    pub fn begin(&self, raw_input: &str) -> Result<InFlight<T>> {
        let trimmed = raw_input.trim();
        if trimmed.is_empty() {
            STORE_REJECTED_EMPTY.click();
            return Err(Error::validation("input is empty"));
        }

        let (index, message) = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.state.pending {
                STORE_REJECTED_BUSY.click();
                return Err(Error::busy("a request is already pending"));
            }
            let message = Message::user(trimmed);
            inner.state.history.push(message.clone());
            inner.state.pending = true;
            (inner.state.history.len() - 1, message)
        };
        STORE_SUBMISSIONS.click();
        tracing::debug!(index, "user message appended");

        self.shared.notify([
            StoreEvent::HistoryAppended { index, message },
            StoreEvent::PendingChanged { pending: true },
        ]);

        Ok(InFlight {
            transport: Rc::clone(&self.transport),
            store: Rc::downgrade(&self.shared),
            message: raw_input.to_string(),
            settled: false,
        })
    }

    /// Replaces the input buffer.
    pub fn set_draft(&self, text: impl Into<String>) {
        self.shared.inner.borrow_mut().draft = text.into();
    }

    /// The current input buffer.
    pub fn draft(&self) -> String {
        self.shared.inner.borrow().draft.clone()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ConversationState {
        self.shared.inner.borrow().state.clone()
    }

    /// A copy of the transcript.
    pub fn history(&self) -> Vec<Message> {
        self.shared.inner.borrow().state.history.clone()
    }

    /// Returns whether a request is outstanding.
    pub fn is_pending(&self) -> bool {
        self.shared.inner.borrow().state.pending
    }

    /// Returns the number of messages in the transcript.
    pub fn message_count(&self) -> usize {
        self.shared.inner.borrow().state.history.len()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let inner = self.shared.inner.borrow();
        let history = &inner.state.history;
        let user_messages = history
            .iter()
            .filter(|m| m.sender() == Sender::User)
            .count();
        SessionStats {
            message_count: history.len(),
            user_messages,
            bot_messages: history.len() - user_messages,
            document_links: history.iter().filter(|m| m.is_document_link()).count(),
            failed_requests: inner.failed_requests,
            pending: inner.state.pending,
        }
    }

    /// Registers `listener` for every subsequent [`StoreEvent`].
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        let id = SubscriptionId(self.shared.next_subscription.get());
        self.shared.next_subscription.set(id.0 + 1);
        let listener: Listener = Rc::new(RefCell::new(listener));
        self.shared.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.shared.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// An outstanding request started by [`ConversationStore::begin`].
///
/// Holds only a weak handle to the store: if the store is gone when the reply
/// arrives, completing is a no-op. Dropping an unfinished `InFlight` clears the
/// pending flag and leaves the user message without a reply.
#[must_use = "the request is not sent until the InFlight is finished"]
pub struct InFlight<T: ChatTransport> {
    transport: Rc<T>,
    store: Weak<Shared>,
    message: String,
    settled: bool,
}

impl<T: ChatTransport> InFlight<T> {
    /// The request body's message, exactly as submitted.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sends the request and records the outcome in the store.
    pub async fn finish(mut self) -> Result<Option<Message>> {
        let outcome = self.transport.send(&self.message).await;
        self.settled = true;

        let Some(shared) = self.store.upgrade() else {
            STORE_DETACHED.click();
            tracing::debug!("conversation dropped before the reply arrived");
            return match outcome {
                Ok(_) => Ok(None),
                Err(err) => {
                    tracing::warn!(error = %err, "chat request failed");
                    Err(err)
                }
            };
        };

        match outcome {
            Ok(text) => {
                let reply = classify_reply(text);
                STORE_REPLIES.click();
                if reply.is_document_link() {
                    STORE_DOCUMENT_LINKS.click();
                }
                shared.settle(Some(reply.clone()));
                Ok(Some(reply))
            }
            Err(err) => {
                STORE_FAILURES.click();
                tracing::warn!(error = %err, "chat request failed");
                shared.settle(None);
                Err(err)
            }
        }
    }
}

impl<T: ChatTransport> Drop for InFlight<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(shared) = self.store.upgrade() {
            tracing::debug!("chat request abandoned before completion");
            shared.settle(None);
        }
    }
}
