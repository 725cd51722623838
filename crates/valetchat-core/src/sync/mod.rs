//! Conversation synchronization
//!
//! ## Overview
//!
//! Both synchronizers follow the same shape: subscribe to child-added events
//! under `conversationIndex/{me}`, one-shot read each referenced message, and
//! fold it into local state. Each open timeline or roster is an actor: a
//! single tokio task owns the state, multiplexes index events, completed
//! reads and profile updates with `tokio::select!`, and broadcasts a full
//! snapshot after every accepted change.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TimelineHandle (one per open conversation)                     │
//! │  ├── index stream -> read + decode + media -> buffer_unordered  │
//! │  ├── users/{counterpart} value stream -> title                  │
//! │  └── event_tx: broadcast::Sender<TimelineEvent>                 │
//! │                                                                 │
//! │  RosterHandle (one per signed-in session)                       │
//! │  ├── index stream -> read + decode -> buffered (arrival order)  │
//! │  └── event_tx: broadcast::Sender<RosterEvent>                   │
//! │                                                                 │
//! │  Outbox (commands)                                              │
//! │  └── one atomic multi-path write per sent message               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Closing a handle (or dropping it) cancels the actor, which drops its
//! subscription streams and discards in-flight reads.

pub mod events;
pub mod outbox;
pub mod roster;
pub mod timeline;

pub use events::{RosterEvent, SubscriptionStatus, TimelineEvent};
pub use outbox::Outbox;
pub use roster::RosterHandle;
pub use timeline::TimelineHandle;

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::media::MediaTransfer;
use crate::store::ConversationStore;

/// Backend handles and settings shared by every synchronizer.
#[derive(Clone)]
pub struct SyncContext {
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) media: MediaTransfer,
    pub(crate) config: ChatConfig,
}

impl SyncContext {
    pub fn new(store: Arc<dyn ConversationStore>, media: MediaTransfer, config: ChatConfig) -> Self {
        Self {
            store,
            media,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn media(&self) -> &MediaTransfer {
        &self.media
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }
}
