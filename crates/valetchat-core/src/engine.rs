//! ChatEngine - the entry point the UI layer holds
//!
//! ChatEngine owns the backend handles and configuration and hands out:
//! - Sessions for registered users
//! - Timeline handles (one per open conversation)
//! - Roster handles (one per signed-in session)
//!
//! # Example
//!
//! ```ignore
//! use valetchat_core::{ChatConfig, ChatEngine, MemoryStore};
//!
//! let engine = ChatEngine::in_memory(MemoryStore::new(), ChatConfig::default());
//! let me = engine.register("111", "Ada", "Lovelace").await?;
//!
//! let roster = engine.open_roster(&me);
//! let chat = engine.open_conversation(&me, "222".into())?;
//! chat.send_text("hi").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::ChatConfig;
use crate::directory::UserDirectory;
use crate::error::{ChatError, ChatResult};
use crate::media::{AudioRecorder, CaptureDevice, HttpDownloader, MediaDownloader, MediaTransfer};
use crate::session::Session;
use crate::store::{ConversationStore, MemoryStore, ObjectStore};
use crate::sync::{Outbox, RosterHandle, SyncContext, TimelineHandle};
use crate::types::UserId;

#[derive(Clone)]
pub struct ChatEngine {
    ctx: SyncContext,
    directory: UserDirectory,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        objects: Arc<dyn ObjectStore>,
        downloader: Arc<dyn MediaDownloader>,
        config: ChatConfig,
    ) -> Self {
        let media = MediaTransfer::new(
            objects,
            downloader,
            config.media.clone(),
            config.audio.clone(),
        );
        Self {
            directory: UserDirectory::new(store.clone()),
            ctx: SyncContext::new(store, media, config),
        }
    }

    /// Engine whose media downloads go over HTTP(S).
    pub fn with_http_downloads(
        store: Arc<dyn ConversationStore>,
        objects: Arc<dyn ObjectStore>,
        config: ChatConfig,
    ) -> ChatResult<Self> {
        let downloader = HttpDownloader::new(&config.media)?;
        Ok(Self::new(store, objects, Arc::new(downloader), config))
    }

    /// Engine backed entirely by `store`.
    pub fn in_memory(store: MemoryStore, config: ChatConfig) -> Self {
        let shared = Arc::new(store);
        Self::new(shared.clone(), shared.clone(), shared, config)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.ctx.config
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn media(&self) -> &MediaTransfer {
        &self.ctx.media
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Create the account for a verified phone number and sign it in.
    pub async fn register(
        &self,
        phone_number: &str,
        first_name: &str,
        last_name: &str,
    ) -> ChatResult<Arc<Session>> {
        let profile = self
            .directory
            .register(phone_number, first_name, last_name)
            .await?;
        let user_id = UserId::new(profile.phone_number.clone());
        Ok(Arc::new(Session::new(user_id, profile)))
    }

    /// Sign in an already registered phone number.
    ///
    /// Returns [`ChatError::NotFound`] when no account exists yet; the caller
    /// should then run registration.
    pub async fn sign_in(&self, phone_number: &str) -> ChatResult<Arc<Session>> {
        let user_id = UserId::from_phone_number(phone_number).ok_or_else(|| {
            ChatError::InvalidInput(format!("not a phone number: {:?}", phone_number))
        })?;
        let profile = self.directory.profile(&user_id).await?;
        info!(user_id = %user_id, "signed in");
        Ok(Arc::new(Session::new(user_id, profile)))
    }

    /// Open the conversation between `session` and `counterpart`.
    pub fn open_conversation(
        &self,
        session: &Arc<Session>,
        counterpart: UserId,
    ) -> ChatResult<TimelineHandle> {
        TimelineHandle::open(&self.ctx, session.clone(), counterpart)
    }

    pub fn open_roster(&self, session: &Arc<Session>) -> RosterHandle {
        RosterHandle::open(&self.ctx, session.clone())
    }

    /// Send without keeping a conversation open.
    pub fn outbox(&self, session: &Arc<Session>) -> Outbox {
        Outbox::new(self.ctx.clone(), session.clone())
    }

    /// Whether `phone_number` belongs to a registered user. Never writes.
    pub async fn exists_counterpart(&self, phone_number: &str) -> ChatResult<bool> {
        self.directory.exists(phone_number).await
    }

    /// Voice recorder writing `.m4a` files under `dir` with the configured profile.
    pub fn recorder(&self, device: Arc<dyn CaptureDevice>, dir: impl Into<PathBuf>) -> AudioRecorder {
        AudioRecorder::new(device, self.ctx.config.audio.clone(), dir)
    }
}
