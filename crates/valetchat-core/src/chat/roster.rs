//! Latest message per counterpart, for the conversation list
//!
//! The roster replaces a counterpart's entry with whatever message arrives
//! next for them. Arrival order, not `sent_at`, decides the winner: the
//! conversation index delivers entries in creation order. A message id that
//! was already applied is ignored, so replayed index events cannot roll an
//! entry back.

use std::collections::{HashMap, HashSet};

use super::message::Message;
use crate::types::{MessageId, UserId};

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub counterpart: UserId,
    pub message: Message,
    /// Text, or a placeholder label for media
    pub preview: String,
    arrival: u64,
}

impl RosterEntry {
    pub fn arrival(&self) -> u64 {
        self.arrival
    }
}

#[derive(Debug, Clone)]
pub struct Roster {
    me: UserId,
    photo_label: String,
    audio_label: String,
    latest: HashMap<UserId, RosterEntry>,
    applied: HashSet<MessageId>,
    arrivals: u64,
}

impl Roster {
    pub fn new(me: UserId) -> Self {
        Self::with_labels(me, "[Photo]", "[Audio]")
    }

    pub fn with_labels(
        me: UserId,
        photo_label: impl Into<String>,
        audio_label: impl Into<String>,
    ) -> Self {
        Self {
            me,
            photo_label: photo_label.into(),
            audio_label: audio_label.into(),
            latest: HashMap::new(),
            applied: HashSet::new(),
            arrivals: 0,
        }
    }

    /// Apply a newly arrived message. Returns whether the roster changed.
    pub fn apply(&mut self, message: Message) -> bool {
        if !message.involves(&self.me) || !self.applied.insert(message.id.clone()) {
            return false;
        }
        let counterpart = message.counterpart_of(&self.me).clone();
        let preview = message.preview(&self.photo_label, &self.audio_label);
        self.arrivals += 1;
        self.latest.insert(
            counterpart.clone(),
            RosterEntry {
                counterpart,
                message,
                preview,
                arrival: self.arrivals,
            },
        );
        true
    }

    pub fn get(&self, counterpart: &UserId) -> Option<&RosterEntry> {
        self.latest.get(counterpart)
    }

    /// Entries ordered most recent first; equal timestamps favour later arrivals.
    pub fn sorted(&self) -> Vec<RosterEntry> {
        let mut entries: Vec<RosterEntry> = self.latest.values().cloned().collect();
        entries.sort_by(|a, b| {
            (b.message.sent_at, b.arrival).cmp(&(a.message.sent_at, a.arrival))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
