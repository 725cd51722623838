//! Sending messages.
//!
//! A sent message is one atomic multi-path write at the store root:
//!
//! ```text
//! messages/{id}                     -> record
//! conversationIndex/{sender}/{id}   -> 1
//! conversationIndex/{receiver}/{id} -> 1
//! ```
//!
//! Media is uploaded before anything is written, so a failed upload leaves no
//! trace in the database. Failures are logged and returned; nothing is retried.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::SyncContext;
use crate::chat::{Message, MessageBody};
use crate::error::{ChatError, ChatResult};
use crate::media::MediaKind;
use crate::session::Session;
use crate::store::{index_updates, paths, validate_key, StorePath};
use crate::types::{MessageId, UserId};

#[derive(Clone)]
pub struct Outbox {
    ctx: SyncContext,
    session: Arc<Session>,
}

impl Outbox {
    pub fn new(ctx: SyncContext, session: Arc<Session>) -> Self {
        Self { ctx, session }
    }

    pub async fn send_text(&self, to: &UserId, text: &str) -> ChatResult<Message> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message text is empty".to_string()));
        }
        self.publish(to, MessageBody::text(text)).await
    }

    /// Upload `raw` (photos are re-encoded first), then send a message
    /// referencing it.
    pub async fn send_media(&self, to: &UserId, raw: &[u8], kind: MediaKind) -> ChatResult<Message> {
        let url = match self.ctx.media.prepare_and_upload(raw, kind).await {
            Ok(url) => url,
            Err(e) => {
                warn!(to = %to, ?kind, error = %e, "media upload failed; nothing sent");
                return Err(e);
            }
        };
        self.publish(to, MessageBody::media(kind, url)).await
    }

    async fn publish(&self, to: &UserId, body: MessageBody) -> ChatResult<Message> {
        validate_key(to.as_str())?;
        let me = self.session.user_id();
        let id = MessageId::new(self.ctx.store.generate_key(&paths::messages()));
        let message = Message::compose(
            id.clone(),
            me.clone(),
            self.session.display_name(),
            to.clone(),
            body,
            Utc::now(),
        );

        let mut children = index_updates(&id, &[me, to]);
        children.insert(paths::message(&id).to_string(), message.to_record());

        if let Err(e) = self.ctx.store.write_children(&StorePath::root(), children).await {
            warn!(message_id = %id, to = %to, error = %e, "failed to send message");
            return Err(e);
        }
        info!(message_id = %id, to = %to, "message sent");
        Ok(message)
    }
}
