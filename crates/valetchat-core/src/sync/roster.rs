//! Conversation roster synchronizer
//!
//! Reduces every message under `conversationIndex/{me}` to "latest message per
//! counterpart". Reads run concurrently but are applied strictly in index
//! arrival order (`buffered`), which is what makes the last-arrival-wins rule
//! deterministic. Media is never downloaded here; photo and voice messages are
//! summarized with fixed labels.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::events::{RosterEvent, SubscriptionStatus};
use super::SyncContext;
use crate::chat::{Message, Roster, RosterEntry};
use crate::directory::UserDirectory;
use crate::error::{ChatError, ChatResult};
use crate::session::Session;
use crate::store::{index_entry_message_id, paths, ChildSnapshot, ConversationStore};
use crate::types::{MessageId, UserId};

enum Fetched {
    Message(Message),
    Skipped {
        message_id: Option<MessageId>,
        error: ChatError,
    },
    IndexFailed(ChatError),
}

async fn fetch(store: Arc<dyn ConversationStore>, item: ChatResult<ChildSnapshot>) -> Fetched {
    let snapshot = match item {
        Ok(snapshot) => snapshot,
        Err(e) => return Fetched::IndexFailed(e),
    };
    let id = match index_entry_message_id(&snapshot) {
        Ok(id) => id,
        Err(error) => {
            return Fetched::Skipped {
                message_id: None,
                error,
            }
        }
    };
    let path = paths::message(&id);
    let loaded = match store.read_once(&path).await {
        Ok(Some(value)) => Message::from_record(id.clone(), &value),
        Ok(None) => Err(ChatError::NotFound(path.to_string())),
        Err(e) => Err(e),
    };
    match loaded {
        Ok(message) => Fetched::Message(message),
        Err(error) => Fetched::Skipped {
            message_id: Some(id),
            error,
        },
    }
}

struct Shared {
    roster: RwLock<Roster>,
    status: RwLock<SubscriptionStatus>,
    event_tx: broadcast::Sender<RosterEvent>,
}

impl Shared {
    fn set_status(&self, status: SubscriptionStatus) {
        *self.status.write() = status;
    }

    fn index_ended(&self) {
        let mut status = self.status.write();
        if *status == SubscriptionStatus::Live {
            *status = SubscriptionStatus::Failed("index subscription ended".to_string());
        }
    }

    fn apply(&self, fetched: Fetched) {
        match fetched {
            Fetched::Message(message) => {
                let id = message.id.clone();
                let sorted = {
                    let mut roster = self.roster.write();
                    if !roster.apply(message) {
                        trace!(message_id = %id, "roster unchanged");
                        return;
                    }
                    roster.sorted()
                };
                debug!(message_id = %id, conversations = sorted.len(), "roster updated");
                let _ = self.event_tx.send(RosterEvent::Changed(sorted));
            }
            Fetched::Skipped { message_id, error } => {
                warn!(message_id = ?message_id.as_ref().map(MessageId::as_str), error = %error, "skipping roster message");
                let _ = self.event_tx.send(RosterEvent::ItemSkipped {
                    message_id,
                    reason: error.to_string(),
                });
            }
            Fetched::IndexFailed(error) => {
                warn!(error = %error, "roster index subscription failed");
                self.set_status(SubscriptionStatus::Failed(error.to_string()));
                let _ = self.event_tx.send(RosterEvent::SubscriptionFailed {
                    reason: error.to_string(),
                });
            }
        }
    }
}

/// The signed-in user's conversation list.
pub struct RosterHandle {
    shared: Arc<Shared>,
    directory: UserDirectory,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RosterHandle {
    /// Subscribe to the session user's conversation index.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(ctx: &SyncContext, session: Arc<Session>) -> Self {
        let me = session.user_id().clone();
        let (event_tx, _) = broadcast::channel(ctx.config.event_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            roster: RwLock::new(Roster::with_labels(
                me.clone(),
                ctx.config.photo_label.clone(),
                ctx.config.audio_label.clone(),
            )),
            status: RwLock::new(SubscriptionStatus::Starting),
            event_tx,
        });

        let store = ctx.store.clone();
        let fetches = ctx
            .store
            .observe_child_added(&paths::conversation_index(&me))
            .map(move |item| fetch(store.clone(), item))
            .buffered(ctx.config.fetch_concurrency.max(1))
            .boxed();

        info!(me = %me, "opening roster");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(shared.clone(), me, fetches, cancel.clone()));

        Self {
            shared,
            directory: UserDirectory::new(ctx.store.clone()),
            cancel,
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Conversations, most recent first.
    pub fn conversations(&self) -> Vec<RosterEntry> {
        self.shared.roster.read().sorted()
    }

    /// Latest message exchanged with `counterpart`.
    pub fn latest(&self, counterpart: &UserId) -> Option<RosterEntry> {
        self.shared.roster.read().get(counterpart).cloned()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.shared.status.read().clone()
    }

    /// Whether `phone_number` belongs to a registered user. Never writes.
    pub async fn exists_counterpart(&self, phone_number: &str) -> ChatResult<bool> {
        self.directory.exists(phone_number).await
    }

    /// Cancel the subscription and wait for the actor to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RosterHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    shared: Arc<Shared>,
    me: UserId,
    mut fetches: BoxStream<'static, Fetched>,
    cancel: CancellationToken,
) {
    shared.set_status(SubscriptionStatus::Live);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                shared.set_status(SubscriptionStatus::Closed);
                break;
            }
            fetched = fetches.next() => match fetched {
                Some(fetched) => shared.apply(fetched),
                None => {
                    debug!(me = %me, "roster index stream ended");
                    shared.index_ended();
                    break;
                }
            },
        }
    }

    debug!(me = %me, "roster actor stopped");
}
