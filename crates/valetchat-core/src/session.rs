//! The signed-in user.

use crate::types::{UserId, UserProfile};

/// Identity of the signed-in user. Immutable; shared as `Arc<Session>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: UserId,
    profile: UserProfile,
}

impl Session {
    pub fn new(user_id: UserId, profile: UserProfile) -> Self {
        Self { user_id, profile }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Name stamped on outgoing messages.
    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}
