//! Events broadcast by open timelines and rosters
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SubscriptionStatus: lifecycle of one synchronizer              │
//! │  ├── Starting: subscription requested                           │
//! │  ├── Live: receiving index events                               │
//! │  ├── Failed: subscription ended with an error                   │
//! │  └── Closed: cancelled by the owner                             │
//! │                                                                 │
//! │  TimelineEvent / RosterEvent: notifications to the UI           │
//! │  ├── Changed: full snapshot after every accepted update         │
//! │  ├── ItemSkipped: one message could not be read or decoded      │
//! │  └── SubscriptionFailed: the index subscription itself failed   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::chat::{RosterEntry, TimelineEntry};
use crate::types::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionStatus {
    #[default]
    Starting,
    Live,
    Failed(String),
    Closed,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Starting => write!(f, "Starting"),
            SubscriptionStatus::Live => write!(f, "Live"),
            SubscriptionStatus::Failed(reason) => write!(f, "Failed: {}", reason),
            SubscriptionStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Events emitted by an open conversation.
#[derive(Debug, Clone)]
pub enum TimelineEvent {
    /// The timeline changed; carries every entry, oldest first
    Changed(Vec<TimelineEntry>),
    /// Media for this message was downloaded and attached
    MediaResolved { message_id: MessageId },
    /// The counterpart's display name (conversation title) was resolved or changed
    CounterpartRenamed { display_name: String },
    /// A message was dropped because it could not be fetched, decoded or resolved
    ItemSkipped {
        message_id: Option<MessageId>,
        reason: String,
    },
    /// The index subscription reported an error
    SubscriptionFailed { reason: String },
}

/// Events emitted by an open roster.
#[derive(Debug, Clone)]
pub enum RosterEvent {
    /// The roster changed; carries every entry, most recent first
    Changed(Vec<RosterEntry>),
    ItemSkipped {
        message_id: Option<MessageId>,
        reason: String,
    },
    SubscriptionFailed { reason: String },
}

impl TimelineEvent {
    /// The snapshot carried by a `Changed` event.
    pub fn snapshot(&self) -> Option<&[TimelineEntry]> {
        match self {
            TimelineEvent::Changed(entries) => Some(entries),
            _ => None,
        }
    }
}

impl RosterEvent {
    pub fn snapshot(&self) -> Option<&[RosterEntry]> {
        match self {
            RosterEvent::Changed(entries) => Some(entries),
            _ => None,
        }
    }
}
