use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use harmony_store::{Direction, Document, DocumentStore, FieldUpdate, NewDocument, Query};
use harmony_types::api::CurrentUser;
use harmony_types::models::Community;

use crate::error::{CoreError, ValidationError};
use crate::live::LiveView;

pub const GROUPS: &str = "groups";

/// Membership-aware listing of micro-communities.
///
/// `create`, `join` and `leave` only issue writes; their effect becomes
/// visible once the live projection receives the next snapshot.
pub struct CommunityDirectory {
    store: Arc<dyn DocumentStore>,
    live: LiveView<Vec<Document>>,
    communities: Vec<Community>,
}

impl CommunityDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            live: LiveView::new(),
            communities: Vec::new(),
        }
    }

    /// Start following every community, oldest first.
    pub async fn watch(&mut self) -> Result<(), CoreError> {
        let query = Query::collection(GROUPS).order_by("createdAt", Direction::Asc);
        let subscription = self.store.live_query(query).await.map_err(CoreError::Subscription)?;
        self.live.attach(subscription);
        Ok(())
    }

    /// One-shot read of every community, for callers that don't keep a
    /// live subscription.
    pub async fn refresh(&mut self) -> Result<(), CoreError> {
        let docs = self.store.read_all(GROUPS).await?;
        self.apply(docs);
        Ok(())
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

    fn apply(&mut self, snapshot: Vec<Document>) {
        self.communities = Document::decode_all(&snapshot);
    }

    pub fn list_all(&self) -> &[Community] {
        &self.communities
    }

    pub fn list_mine(&self, user: &CurrentUser) -> Vec<&Community> {
        self.communities.iter().filter(|c| c.is_member(&user.id)).collect()
    }

    pub fn get(&self, community_id: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == community_id)
    }

    /// Create a community with `user` as creator and sole member.
    pub async fn create(&self, user: &CurrentUser, name: &str) -> Result<String, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankName.into());
        }

        let id = self.store.create(GROUPS, community_document(user, name)).await?;
        info!("{} created community '{}' ({})", user.id, name, id);
        Ok(id)
    }

    /// Returns false, writing nothing, when the projection already shows
    /// `user` as a member. The store recounts `memberCount` from `members`
    /// in the same write, so repeated or stale joins never inflate it.
    pub async fn join(&self, user: &CurrentUser, community_id: &str) -> Result<bool, CoreError> {
        if self.get(community_id).is_some_and(|c| c.is_member(&user.id)) {
            debug!("{} already in {}", user.id, community_id);
            return Ok(false);
        }

        self.store
            .update(
                GROUPS,
                community_id,
                membership_change(FieldUpdate::array_union("members", vec![json!(user.id)])),
            )
            .await?;
        info!("{} joined {}", user.id, community_id);
        Ok(true)
    }

    /// Returns false, writing nothing, when the projection shows `user` is
    /// not a member. A non-member leaving through a stale or missing
    /// projection leaves the count untouched.
    pub async fn leave(&self, user: &CurrentUser, community_id: &str) -> Result<bool, CoreError> {
        if self.get(community_id).is_some_and(|c| !c.is_member(&user.id)) {
            debug!("{} not in {}", user.id, community_id);
            return Ok(false);
        }

        self.store
            .update(
                GROUPS,
                community_id,
                membership_change(FieldUpdate::array_remove("members", vec![json!(user.id)])),
            )
            .await?;
        info!("{} left {}", user.id, community_id);
        Ok(true)
    }
}

fn membership_change(members: FieldUpdate) -> Vec<FieldUpdate> {
    vec![
        members,
        FieldUpdate::array_length("memberCount", "members"),
        FieldUpdate::server_timestamp("updatedAt"),
    ]
}

pub(crate) fn community_document(user: &CurrentUser, name: &str) -> NewDocument {
    NewDocument::new()
        .set("name", name)
        .set("members", json!([user.id]))
        .set("memberCount", 1)
        .set("createdBy", user.id.as_str())
        .server_timestamp("createdAt")
}
