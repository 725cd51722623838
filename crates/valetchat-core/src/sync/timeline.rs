//! Message timeline synchronizer for one open conversation
//!
//! Index entries under `conversationIndex/{me}` are fetched concurrently and
//! accepted in completion order: a text message shows up as soon as its record
//! is read, a photo or voice message only once its media has been downloaded.
//! Ordering is re-derived on every insert, so completion order never leaks
//! into the visible timeline.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::events::{SubscriptionStatus, TimelineEvent};
use super::outbox::Outbox;
use super::SyncContext;
use crate::chat::{Message, Timeline, TimelineEntry};
use crate::directory::decode_profile;
use crate::error::{ChatError, ChatResult};
use crate::media::{MediaKind, MediaTransfer};
use crate::session::Session;
use crate::store::{
    index_entry_message_id, paths, validate_key, ChildSnapshot, ConversationStore, ValueStream,
};
use crate::types::{MessageId, UserId};

/// Result of processing one index entry.
enum Fetched {
    Entry(TimelineEntry),
    /// Belongs to a conversation with someone else
    Foreign(MessageId),
    Skipped {
        message_id: Option<MessageId>,
        error: ChatError,
    },
    IndexFailed(ChatError),
}

/// Reads and resolves the message behind an index entry.
struct Loader {
    store: Arc<dyn ConversationStore>,
    media: MediaTransfer,
    me: UserId,
    counterpart: UserId,
}

impl Loader {
    async fn fetch(&self, arrival: u64, item: ChatResult<ChildSnapshot>) -> Fetched {
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
        match self.load(&id, arrival).await {
            Ok(Some(entry)) => Fetched::Entry(entry),
            Ok(None) => Fetched::Foreign(id),
            Err(error) => Fetched::Skipped {
                message_id: Some(id),
                error,
            },
        }
    }

    async fn load(&self, id: &MessageId, arrival: u64) -> ChatResult<Option<TimelineEntry>> {
        let path = paths::message(id);
        let value = self
            .store
            .read_once(&path)
            .await?
            .ok_or_else(|| ChatError::NotFound(path.to_string()))?;
        let message = Message::from_record(id.clone(), &value)?;
        if !message.is_between(&self.me, &self.counterpart) {
            return Ok(None);
        }
        let media = self.media.resolve(&message.body).await?;
        Ok(Some(TimelineEntry::new(message, media, arrival)))
    }
}

/// State shared between the handle (readers) and the actor (sole writer).
struct Shared {
    timeline: RwLock<Timeline>,
    counterpart_name: RwLock<Option<String>>,
    status: RwLock<SubscriptionStatus>,
    event_tx: broadcast::Sender<TimelineEvent>,
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
            Fetched::Entry(entry) => {
                let id = entry.id().clone();
                let resolved_media = entry.media.is_some();
                let snapshot = {
                    let mut timeline = self.timeline.write();
                    if !timeline.insert(entry) {
                        trace!(message_id = %id, "duplicate index entry ignored");
                        return;
                    }
                    timeline.entries().to_vec()
                };
                debug!(message_id = %id, len = snapshot.len(), "timeline updated");
                let _ = self.event_tx.send(TimelineEvent::Changed(snapshot));
                if resolved_media {
                    let _ = self
                        .event_tx
                        .send(TimelineEvent::MediaResolved { message_id: id });
                }
            }
            Fetched::Foreign(id) => {
                trace!(message_id = %id, "message belongs to another conversation");
            }
            Fetched::Skipped { message_id, error } => {
                warn!(message_id = ?message_id.as_ref().map(MessageId::as_str), error = %error, "skipping message");
                let _ = self.event_tx.send(TimelineEvent::ItemSkipped {
                    message_id,
                    reason: error.to_string(),
                });
            }
            Fetched::IndexFailed(error) => {
                warn!(error = %error, "conversation index subscription failed");
                self.set_status(SubscriptionStatus::Failed(error.to_string()));
                let _ = self.event_tx.send(TimelineEvent::SubscriptionFailed {
                    reason: error.to_string(),
                });
            }
        }
    }

    fn rename(&self, display_name: String) {
        {
            let mut current = self.counterpart_name.write();
            if current.as_deref() == Some(display_name.as_str()) {
                return;
            }
            *current = Some(display_name.clone());
        }
        let _ = self
            .event_tx
            .send(TimelineEvent::CounterpartRenamed { display_name });
    }
}

/// An open conversation with one counterpart.
///
/// Dropping the handle cancels the subscription; [`close`](Self::close) also
/// waits for the actor to exit.
pub struct TimelineHandle {
    counterpart: UserId,
    shared: Arc<Shared>,
    outbox: Outbox,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TimelineHandle {
    /// Subscribe to the conversation between the session user and `counterpart`.
    ///
    /// Fails with [`ChatError::InvalidInput`] when `counterpart` is not a
    /// single store key. Must be called from within a tokio runtime.
    pub fn open(ctx: &SyncContext, session: Arc<Session>, counterpart: UserId) -> ChatResult<Self> {
        validate_key(counterpart.as_str())?;
        let me = session.user_id().clone();
        let (event_tx, _) = broadcast::channel(ctx.config.event_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            timeline: RwLock::new(Timeline::new(me.clone(), counterpart.clone())),
            counterpart_name: RwLock::new(None),
            status: RwLock::new(SubscriptionStatus::Starting),
            event_tx,
        });

        let index = ctx.store.observe_child_added(&paths::conversation_index(&me));
        let profile = ctx.store.observe_value(&paths::user(&counterpart));
        let loader = Arc::new(Loader {
            store: ctx.store.clone(),
            media: ctx.media.clone(),
            me: me.clone(),
            counterpart: counterpart.clone(),
        });
        let fetches = index
            .enumerate()
            .map(move |(arrival, item)| {
                let loader = loader.clone();
                async move { loader.fetch(arrival as u64, item).await }
            })
            .buffer_unordered(ctx.config.fetch_concurrency.max(1))
            .boxed();

        info!(me = %me, counterpart = %counterpart, "opening conversation");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            shared.clone(),
            counterpart.clone(),
            fetches,
            profile,
            cancel.clone(),
        ));

        Ok(Self {
            counterpart,
            shared,
            outbox: Outbox::new(ctx.clone(), session),
            cancel,
            task: Some(task),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    /// Counterpart's display name, once resolved.
    pub fn counterpart_name(&self) -> Option<String> {
        self.shared.counterpart_name.read().clone()
    }

    /// Current entries, oldest first.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.shared.timeline.read().entries().to_vec()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.timeline.read().messages().cloned().collect()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.shared.status.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Send a text message to the counterpart.
    ///
    /// The message appears in the timeline when its index entry comes back
    /// through the subscription.
    pub async fn send_text(&self, text: &str) -> ChatResult<Message> {
        self.ensure_open()?;
        self.outbox.send_text(&self.counterpart, text).await
    }

    /// Upload a photo or recording and send it to the counterpart.
    pub async fn send_media(&self, raw: &[u8], kind: MediaKind) -> ChatResult<Message> {
        self.ensure_open()?;
        self.outbox.send_media(&self.counterpart, raw, kind).await
    }

    /// Cancel the subscription and wait for the actor to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn ensure_open(&self) -> ChatResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::Closed);
        }
        Ok(())
    }
}

impl Drop for TimelineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    shared: Arc<Shared>,
    counterpart: UserId,
    mut fetches: BoxStream<'static, Fetched>,
    mut profile: ValueStream,
    cancel: CancellationToken,
) {
    shared.set_status(SubscriptionStatus::Live);
    let mut profile_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                shared.set_status(SubscriptionStatus::Closed);
                break;
            }
            fetched = fetches.next() => match fetched {
                Some(fetched) => shared.apply(fetched),
                None => {
                    debug!(counterpart = %counterpart, "conversation index stream ended");
                    shared.index_ended();
                    break;
                }
            },
            update = profile.next(), if profile_open => match update {
                Some(Ok(Some(value))) => match decode_profile(&counterpart, &value) {
                    Ok(profile) => shared.rename(profile.display_name),
                    Err(e) => warn!(counterpart = %counterpart, error = %e, "bad counterpart profile"),
                },
                Some(Ok(None)) => trace!(counterpart = %counterpart, "counterpart has no profile"),
                Some(Err(e)) => warn!(counterpart = %counterpart, error = %e, "profile subscription error"),
                None => profile_open = false,
            },
        }
    }

    debug!(counterpart = %counterpart, "timeline actor stopped");
}
