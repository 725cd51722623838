//! Core types for ValetChat

use serde::{Deserialize, Serialize};

/// Identifier of a registered user.
///
/// Users are keyed by their verified phone number, so the id doubles as the
/// phone number shown in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from a phone number or existing key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize user-entered phone numbers into a store key.
    ///
    /// Store keys may not contain `.`, `#`, `$`, `[`, `]` or `/`, so everything
    /// except digits and a leading `+` is dropped. Returns `None` when no digits
    /// remain.
    pub fn from_phone_number(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let mut out = String::with_capacity(trimmed.len());
        if trimmed.starts_with('+') {
            out.push('+');
        }
        out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
        if out.trim_start_matches('+').is_empty() {
            None
        } else {
            Some(Self(out))
        }
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Store-assigned key of a message record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Public profile stored at `users/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub phone_number: String,
    pub display_name: String,
}

impl UserProfile {
    pub fn new(phone_number: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            display_name: display_name.into(),
        }
    }
}
