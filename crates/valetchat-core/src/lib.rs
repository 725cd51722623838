//! ValetChat Core Library
//!
//! Conversation synchronization for a phone-number based messenger built on a
//! hosted realtime database and object store.
//!
//! ## Overview
//!
//! The hosted backend does persistence and fan-out. This crate does the part
//! the client owns: incremental message retrieval through child-added
//! subscriptions, ordering and de-duplication into a per-conversation
//! timeline, and the "latest message per counterpart" reduction behind the
//! conversation list.
//!
//! ## Quick Start
//!
//! ```ignore
//! use valetchat_core::{ChatConfig, ChatEngine, MemoryStore, TimelineEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChatEngine::in_memory(MemoryStore::new(), ChatConfig::default());
//!     let ada = engine.register("111", "Ada", "Lovelace").await?;
//!
//!     let chat = engine.open_conversation(&ada, "222".into())?;
//!     let mut events = chat.subscribe();
//!     chat.send_text("hi").await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let TimelineEvent::Changed(entries) = event {
//!             println!("{} messages", entries.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod logging;
pub mod media;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use chat::{Message, MessageBody, Roster, RosterEntry, Timeline, TimelineEntry};
pub use config::{AudioProfile, ChatConfig, MediaConfig};
pub use directory::UserDirectory;
pub use engine::ChatEngine;
pub use error::{ChatError, ChatResult};
pub use media::{
    AudioRecorder, CaptureDevice, HttpDownloader, MediaDownloader, MediaKind, MediaTransfer,
    RecorderEvent, ResolvedMedia,
};
pub use session::Session;
pub use store::{ConversationStore, MemoryStore, ObjectStore, StorePath};
pub use sync::{
    Outbox, RosterEvent, RosterHandle, SubscriptionStatus, SyncContext, TimelineEvent,
    TimelineHandle,
};
pub use types::{MessageId, UserId, UserProfile};
