//! Ordered message history for one two-party conversation
//!
//! A [`Timeline`] only accepts messages exchanged between its owner and the
//! counterpart, ignores duplicates by id, and keeps entries ordered by
//! `sent_at`. Entries with equal timestamps (day-granularity legacy records)
//! keep the order in which they arrived.

use super::message::Message;
use crate::media::ResolvedMedia;
use crate::types::{MessageId, UserId};

/// A message plus its downloaded media, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub message: Message,
    /// Present for image/audio messages once retrieved
    pub media: Option<ResolvedMedia>,
    arrival: u64,
}

impl TimelineEntry {
    /// `arrival` is the position of the index event that produced this entry.
    pub fn new(message: Message, media: Option<ResolvedMedia>, arrival: u64) -> Self {
        Self {
            message,
            media,
            arrival,
        }
    }

    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    pub fn id(&self) -> &MessageId {
        &self.message.id
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    me: UserId,
    counterpart: UserId,
    /// Oldest first
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new(me: UserId, counterpart: UserId) -> Self {
        Self {
            me,
            counterpart,
            entries: Vec::new(),
        }
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    /// Whether `message` belongs to this conversation.
    pub fn accepts(&self, message: &Message) -> bool {
        message.is_between(&self.me, &self.counterpart)
    }

    /// Insert an entry and re-sort.
    ///
    /// Returns `false` if the entry was a duplicate or belongs to another
    /// conversation.
    pub fn insert(&mut self, entry: TimelineEntry) -> bool {
        if !self.accepts(&entry.message) || self.contains(entry.id()) {
            return false;
        }
        self.entries.push(entry);
        self.entries
            .sort_by(|a, b| (a.message.sent_at, a.arrival).cmp(&(b.message.sent_at, b.arrival)));
        true
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.entries.last().map(|e| &e.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageBody;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, from: &str, to: &str, text: &str, ms: i64, arrival: u64) -> TimelineEntry {
        TimelineEntry::new(
            Message::compose(
                MessageId::new(id),
                UserId::new(from),
                "",
                UserId::new(to),
                MessageBody::text(text),
                Utc.timestamp_millis_opt(ms).unwrap(),
            ),
            None,
            arrival,
        )
    }

    fn texts(timeline: &Timeline) -> Vec<&str> {
        timeline
            .messages()
            .filter_map(|m| m.body.as_text())
            .collect()
    }

    fn timeline() -> Timeline {
        Timeline::new(UserId::new("222"), UserId::new("111"))
    }

    #[test]
    fn test_out_of_order_inserts_are_sorted() {
        let mut t = timeline();
        assert!(t.insert(entry("c", "111", "222", "Third", 3000, 0)));
        assert!(t.insert(entry("a", "222", "111", "First", 1000, 1)));
        assert!(t.insert(entry("b", "111", "222", "Second", 2000, 2)));
        assert_eq!(texts(&t), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut t = timeline();
        assert!(t.insert(entry("a", "111", "222", "Hello", 1000, 0)));
        assert!(!t.insert(entry("a", "111", "222", "Hello", 1000, 1)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_other_conversations_rejected() {
        let mut t = timeline();
        assert!(!t.insert(entry("x", "333", "222", "Not for this chat", 1000, 0)));
        assert!(!t.insert(entry("y", "222", "333", "Nor this", 1000, 1)));
        assert!(t.is_empty());
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut t = timeline();
        t.insert(entry("b", "111", "222", "second", 0, 5));
        t.insert(entry("a", "111", "222", "first", 0, 2));
        t.insert(entry("c", "222", "111", "third", 0, 9));
        assert_eq!(texts(&t), vec!["first", "second", "third"]);
        assert_eq!(t.last_message().unwrap().id.as_str(), "c");
    }
}
