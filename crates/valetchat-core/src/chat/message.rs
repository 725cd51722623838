//! Chat message types and their wire records
//!
//! A [`Message`] is decoded from the schemaless record stored at
//! `messages/{id}`. Decoding is the only place where record shape is checked:
//! anything missing or ill-typed becomes [`ChatError::Decode`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ChatError, ChatResult};
use crate::media::MediaKind;
use crate::store::paths;
use crate::types::{MessageId, UserId};

/// Day-granularity date format kept in `sentAt` for older clients.
pub const LEGACY_DATE_FORMAT: &str = "%m/%d/%y";

/// Exactly one payload per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text { text: String },
    Image { url: Url },
    Audio { url: Url },
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        MessageBody::Text { text: text.into() }
    }

    /// Media body of the given kind.
    pub fn media(kind: MediaKind, url: Url) -> Self {
        match kind {
            MediaKind::Image => MessageBody::Image { url },
            MediaKind::Audio => MessageBody::Audio { url },
        }
    }

    /// Kind and URL of a media body, `None` for text.
    pub fn media_ref(&self) -> Option<(MediaKind, &Url)> {
        match self {
            MessageBody::Text { .. } => None,
            MessageBody::Image { url } => Some((MediaKind::Image, url)),
            MessageBody::Audio { url } => Some((MediaKind::Audio, url)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageBody::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// An immutable chat event between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned key
    pub id: MessageId,
    pub sender_id: UserId,
    /// Sender's display name at send time
    pub sender_display_name: String,
    pub receiver_id: UserId,
    pub sent_at: DateTime<Utc>,
    pub body: MessageBody,
}

/// Shape of `messages/{id}` on the wire.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sent_at_millis: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
}

impl Message {
    /// Build an outgoing message.
    pub fn compose(
        id: MessageId,
        sender_id: UserId,
        sender_display_name: impl Into<String>,
        receiver_id: UserId,
        body: MessageBody,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id,
            sender_display_name: sender_display_name.into(),
            receiver_id,
            sent_at,
            body,
        }
    }

    /// The participant who is not `me`.
    ///
    /// When `me` is the receiver the counterpart is the sender; otherwise it is
    /// the receiver.
    pub fn counterpart_of(&self, me: &UserId) -> &UserId {
        if &self.receiver_id == me {
            &self.sender_id
        } else {
            &self.receiver_id
        }
    }

    /// Whether `user` is the sender or the receiver.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender_id == user || &self.receiver_id == user
    }

    /// Whether this message was exchanged between exactly `a` and `b`.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }

    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }

    /// One-line summary: the text itself, or a fixed label for media.
    pub fn preview(&self, photo_label: &str, audio_label: &str) -> String {
        match &self.body {
            MessageBody::Text { text } => text.clone(),
            MessageBody::Image { .. } => photo_label.to_string(),
            MessageBody::Audio { .. } => audio_label.to_string(),
        }
    }

    /// Encode as the record stored at `messages/{id}`.
    pub fn to_record(&self) -> Value {
        let mut record = MessageRecord {
            sender_id: Some(self.sender_id.to_string()),
            sender_display_name: Some(self.sender_display_name.clone()),
            receiver_id: Some(self.receiver_id.to_string()),
            sent_at: Some(self.sent_at.format(LEGACY_DATE_FORMAT).to_string()),
            sent_at_millis: Some(self.sent_at.timestamp_millis()),
            ..Default::default()
        };
        match &self.body {
            MessageBody::Text { text } => record.text = Some(text.clone()),
            MessageBody::Image { url } => record.image_url = Some(url.to_string()),
            MessageBody::Audio { url } => record.audio_url = Some(url.to_string()),
        }
        serde_json::to_value(record).unwrap_or(Value::Null)
    }

    /// Decode the record stored at `messages/{id}`.
    pub fn from_record(id: MessageId, value: &Value) -> ChatResult<Self> {
        let path = paths::message(&id);
        let record: MessageRecord = serde_json::from_value(value.clone())
            .map_err(|e| ChatError::decode(&path, e.to_string()))?;

        let required = |field: Option<String>, name: &str| {
            field
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ChatError::decode(&path, format!("missing {}", name)))
        };
        let sender_id = UserId::new(required(record.sender_id, "senderId")?);
        let receiver_id = UserId::new(required(record.receiver_id, "receiverId")?);
        let sender_display_name = record.sender_display_name.unwrap_or_default();
        let sent_at = decode_sent_at(record.sent_at_millis, record.sent_at.as_deref())
            .ok_or_else(|| ChatError::decode(&path, "missing or unparseable sentAt"))?;

        let parse_url = |raw: &str| {
            Url::parse(raw).map_err(|e| ChatError::decode(&path, format!("bad media url: {}", e)))
        };
        let body = match (record.text, record.image_url, record.audio_url) {
            (Some(text), None, None) => MessageBody::Text { text },
            (None, Some(url), None) => MessageBody::Image { url: parse_url(&url)? },
            (None, None, Some(url)) => MessageBody::Audio { url: parse_url(&url)? },
            (None, None, None) => return Err(ChatError::decode(&path, "no message body")),
            _ => return Err(ChatError::decode(&path, "more than one message body")),
        };

        Ok(Self {
            id,
            sender_id,
            sender_display_name,
            receiver_id,
            sent_at,
            body,
        })
    }
}

/// Millisecond timestamp if present, else the legacy date at midnight UTC.
fn decode_sent_at(millis: Option<i64>, legacy: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(ts) = millis.and_then(DateTime::from_timestamp_millis) {
        return Some(ts);
    }
    let date = NaiveDate::parse_from_str(legacy?.trim(), LEGACY_DATE_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
