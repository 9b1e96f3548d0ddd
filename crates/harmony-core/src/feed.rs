use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info};

use harmony_store::{Direction, Document, DocumentStore, FieldUpdate, NewDocument, Query, StoreError};
use harmony_types::api::CurrentUser;
use harmony_types::models::{Comment, ReflectionPost};

use crate::community::GROUPS;
use crate::error::{CoreError, ValidationError};
use crate::live::LiveView;

pub const POSTS: &str = "posts";

/// Reaction palette offered by the UI. Other emoji are accepted too.
pub const REACTION_EMOJIS: [&str; 5] = ["👍", "❤️", "😊", "🎉", "🙏"];

/// The reflection feed of one group at a time.
///
/// Posts are never inserted optimistically: a new post shows up once the
/// live query delivers a snapshot containing it. Reaction counts written
/// by this feed are folded into the local copy as soon as the write lands.
pub struct ReflectionFeed {
    store: Arc<dyn DocumentStore>,
    group_id: Option<String>,
    live: LiveView<Vec<Document>>,
    posts: Vec<ReflectionPost>,
}

impl ReflectionFeed {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            group_id: None,
            live: LiveView::new(),
            posts: Vec::new(),
        }
    }

    /// Follow `group_id`. The previous group's subscription is cancelled
    /// before the new one is opened.
    pub async fn subscribe(&mut self, group_id: &str) -> Result<(), CoreError> {
        self.unsubscribe();

        let query = Query::collection(POSTS)
            .where_eq("communityId", group_id)
            .order_by("timestamp", Direction::Desc);
        let subscription = self.store.live_query(query).await.map_err(CoreError::Subscription)?;

        info!("Feed following group {}", group_id);
        self.group_id = Some(group_id.to_string());
        self.live.attach(subscription);
        Ok(())
    }

    /// Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(group_id) = self.group_id.take() {
            debug!("Feed leaving group {}", group_id);
        }
        self.live.detach();
        self.posts.clear();
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_attached()
    }

    /// Newest first.
    pub fn posts(&self) -> &[ReflectionPost] {
        &self.posts
    }

    pub fn find(&self, post_id: &str) -> Option<&ReflectionPost> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    /// Wait for the next snapshot and fold it in. Pends while no group is
    /// selected.
    pub async fn next_update(&mut self) -> Result<(), CoreError> {
        let snapshot = self.live.next().await?;
        self.apply(snapshot);
        Ok(())
    }

    /// Fold in the newest queued snapshot, if any. Returns whether anything changed.
    pub fn poll_updates(&mut self) -> Result<bool, CoreError> {
        match self.live.try_latest()? {
            Some(snapshot) => {
                self.apply(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply(&mut self, snapshot: Vec<Document>) {
        let Some(group_id) = self.group_id.as_deref() else {
            return;
        };
        let mut posts: Vec<ReflectionPost> = Document::decode_all(&snapshot);
        posts.retain(|p| p.community_id == group_id);
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.posts = posts;
    }

    /// Create a post in the selected group and return its id.
    pub async fn post(&self, user: &CurrentUser, text: &str) -> Result<String, CoreError> {
        if text.trim().is_empty() {
            return Err(ValidationError::BlankText.into());
        }
        let group_id = self.group_id.as_deref().ok_or(CoreError::NoGroupSelected)?;

        let community_name = self.community_name(group_id).await?;
        let id = self
            .store
            .create(POSTS, post_document(group_id, &community_name, user, text))
            .await?;
        debug!("{} posted {} to {}", user.id, id, group_id);
        Ok(id)
    }

    /// Empty when the group has no community document.
    async fn community_name(&self, group_id: &str) -> Result<String, CoreError> {
        let doc = self.store.get(GROUPS, group_id).await?;
        Ok(doc
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Read the last known count, add one, write the absolute value back.
    ///
    /// Two clients reacting from the same count both write N+1, so one
    /// increment is lost. `react_atomic` avoids that.
    pub async fn react(&mut self, post_id: &str, emoji: &str) -> Result<u64, CoreError> {
        let emoji = validate_emoji(emoji)?;
        let next = self.find(post_id).map_or(0, |p| p.reaction_count(emoji)) + 1;

        self.store
            .update(POSTS, post_id, vec![FieldUpdate::set(reaction_path(emoji), next)])
            .await?;

        if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
            post.reactions.insert(emoji.to_string(), next);
        }
        Ok(next)
    }

    /// Store-side increment; concurrent reactions all count.
    pub async fn react_atomic(&self, post_id: &str, emoji: &str) -> Result<(), CoreError> {
        let emoji = validate_emoji(emoji)?;
        self.store
            .update(POSTS, post_id, vec![FieldUpdate::increment(reaction_path(emoji), 1)])
            .await?;
        Ok(())
    }

    /// Append a comment. Existing comments are never dropped; the order of
    /// concurrent comments is whatever order the store applied them in.
    pub async fn comment(&self, user: &CurrentUser, post_id: &str, text: &str) -> Result<(), CoreError> {
        if text.trim().is_empty() {
            return Err(ValidationError::BlankText.into());
        }

        let comment = Comment {
            user: user.author_name(),
            user_email: user.email.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&comment).map_err(StoreError::from)?;

        self.store
            .update(POSTS, post_id, vec![FieldUpdate::array_union("comments", vec![value])])
            .await?;
        Ok(())
    }
}

pub(crate) fn post_document(group_id: &str, community_name: &str, user: &CurrentUser, text: &str) -> NewDocument {
    NewDocument::new()
        .set("communityId", group_id)
        .set("communityName", community_name)
        .set("userId", user.id.as_str())
        .set("userName", user.author_name())
        .set("userEmail", user.email.clone().map_or(Value::Null, Value::String))
        .set("text", text)
        .set("reactions", json!({}))
        .set("comments", json!([]))
        .server_timestamp("timestamp")
}

fn validate_emoji(emoji: &str) -> Result<&str, ValidationError> {
    let emoji = emoji.trim();
    if emoji.is_empty() || emoji.contains('.') {
        return Err(ValidationError::InvalidEmoji(emoji.to_string()));
    }
    Ok(emoji)
}

fn reaction_path(emoji: &str) -> String {
    format!("reactions.{}", emoji)
}
