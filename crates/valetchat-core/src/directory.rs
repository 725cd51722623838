//! User directory: registration, profile lookup and existence checks.
//!
//! Users are keyed by their verified phone number under `users/{userId}`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::store::{paths, ConversationStore};
use crate::types::{UserId, UserProfile};

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn ConversationStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Create or overwrite the profile for `phone_number`.
    ///
    /// The display name is `"{first} {last}"`; both parts are required.
    pub async fn register(
        &self,
        phone_number: &str,
        first_name: &str,
        last_name: &str,
    ) -> ChatResult<UserProfile> {
        let id = UserId::from_phone_number(phone_number).ok_or_else(|| {
            ChatError::InvalidInput(format!("not a phone number: {:?}", phone_number))
        })?;
        let (first, last) = (first_name.trim(), last_name.trim());
        if first.is_empty() || last.is_empty() {
            return Err(ChatError::InvalidInput(
                "first and last name are required".to_string(),
            ));
        }

        let profile = UserProfile::new(id.as_str(), format!("{} {}", first, last));
        let record =
            serde_json::to_value(&profile).map_err(|e| ChatError::Store(e.to_string()))?;
        let mut children = Map::new();
        children.insert(id.to_string(), record);
        self.store.write_children(&paths::users(), children).await?;

        info!(user_id = %id, "user registered");
        Ok(profile)
    }

    /// Profile of an existing user.
    pub async fn profile(&self, id: &UserId) -> ChatResult<UserProfile> {
        let path = paths::user(id);
        let value = self
            .store
            .read_once(&path)
            .await?
            .ok_or_else(|| ChatError::NotFound(path.to_string()))?;
        decode_profile(id, &value)
    }

    /// Whether a user is registered under `phone_number`. Never writes.
    ///
    /// Input that does not normalize to a phone number is simply not registered.
    pub async fn exists(&self, phone_number: &str) -> ChatResult<bool> {
        let Some(id) = UserId::from_phone_number(phone_number) else {
            debug!(phone_number, "existence check on unparseable number");
            return Ok(false);
        };
        self.store.exists(&paths::users(), id.as_str()).await
    }
}

/// Decode the record stored at `users/{id}`.
pub fn decode_profile(id: &UserId, value: &Value) -> ChatResult<UserProfile> {
    serde_json::from_value(value.clone())
        .map_err(|e| ChatError::decode(paths::user(id), e.to_string()))
}
