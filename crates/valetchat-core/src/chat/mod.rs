//! Chat data model
//!
//! Pure, synchronous types: no I/O happens in this module. The synchronizers
//! in [`crate::sync`] feed decoded messages into these structures.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Chat Layer (this module)                                       │
//! │  - Message: decoded `messages/{id}` record                      │
//! │  - Timeline: ordered history with one counterpart               │
//! │  - Roster: latest message per counterpart                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Sync Layer (sync module)                                       │
//! │  - TimelineHandle / RosterHandle: one actor task each           │
//! │  - broadcast of full snapshots to the UI                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Store Layer (store module)                                     │
//! │  - ConversationStore: child-added / value subscriptions         │
//! │  - ObjectStore: media blobs                                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod message;
mod roster;
mod timeline;

pub use message::{Message, MessageBody, LEGACY_DATE_FORMAT};
pub use roster::{Roster, RosterEntry};
pub use timeline::{Timeline, TimelineEntry};
