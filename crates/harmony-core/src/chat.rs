use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use harmony_store::{AppendLog, LogEntry};
use harmony_types::api::CurrentUser;
use harmony_types::models::ChatMessage;

use crate::error::{CoreError, ValidationError};
use crate::live::LiveView;

pub fn chat_path(group_id: &str) -> String {
    format!("chats/{}/messages", group_id)
}

/// Group chat for one group at a time. The listener is swapped out, never
/// doubled up, when the group changes.
pub struct GroupChat {
    log: Arc<dyn AppendLog>,
    group_id: Option<String>,
    live: LiveView<Vec<LogEntry>>,
    messages: Vec<ChatMessage>,
}

impl GroupChat {
    pub fn new(log: Arc<dyn AppendLog>) -> Self {
        Self {
            log,
            group_id: None,
            live: LiveView::new(),
            messages: Vec::new(),
        }
    }

    pub async fn open(&mut self, group_id: &str) -> Result<(), CoreError> {
        self.close();
        let subscription = self
            .log
            .subscribe(&chat_path(group_id))
            .await
            .map_err(CoreError::Subscription)?;
        self.group_id = Some(group_id.to_string());
        self.live.attach(subscription);
        Ok(())
    }

    pub fn close(&mut self) {
        self.live.detach();
        self.group_id = None;
        self.messages.clear();
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    /// Oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_own(&self, message: &ChatMessage, user: &CurrentUser) -> bool {
        message.user_id == user.id
    }

    pub async fn next_update(&mut self) -> Result<(), CoreError> {
        let snapshot = self.live.next().await?;
        self.apply(snapshot);
        Ok(())
    }

    pub fn poll_updates(&mut self) -> Result<bool, CoreError> {
        match self.live.try_latest()? {
            Some(snapshot) => {
                self.apply(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply(&mut self, snapshot: Vec<LogEntry>) {
        let mut messages: Vec<ChatMessage> = snapshot
            .iter()
            .filter_map(|entry| match entry.decode() {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping chat entry: {}", e);
                    None
                }
            })
            .collect();
        // Stable: equal timestamps keep push order.
        messages.sort_by_key(|m| m.timestamp);
        self.messages = messages;
    }

    /// Append a message to the open group; returns the generated key.
    pub async fn send(&self, user: &CurrentUser, text: &str) -> Result<String, CoreError> {
        if text.trim().is_empty() {
            return Err(ValidationError::BlankText.into());
        }
        let group_id = self.group_id.as_deref().ok_or(CoreError::NoGroupSelected)?;

        let key = self
            .log
            .push(
                &chat_path(group_id),
                json!({
                    "userId": user.id,
                    "userName": user.author_name(),
                    "text": text,
                }),
            )
            .await?;
        debug!("{} sent {} to {}", user.id, key, group_id);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_store::SqliteStore;

    #[tokio::test]
    async fn send_requires_text_and_group() {
        let chat = GroupChat::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let user = CurrentUser::new("u1");
        assert!(chat.send(&user, "").await.unwrap_err().is_validation());
        assert!(matches!(
            chat.send(&user, "hi").await.unwrap_err(),
            CoreError::NoGroupSelected
        ));
    }

    #[test]
    fn chat_paths_are_per_group() {
        assert_eq!(chat_path("g1"), "chats/g1/messages");
    }
}
