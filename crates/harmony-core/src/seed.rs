use tracing::info;

use harmony_store::DocumentStore;
use harmony_types::api::CurrentUser;

use crate::community::{GROUPS, community_document};
use crate::error::CoreError;
use crate::feed::{POSTS, post_document};

pub const WELCOME_COMMUNITY: &str = "Welcome Community";
pub const WELCOME_POST: &str = "Welcome to Harmony Hub! Share a reflection to get started.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Communities already exist; nothing was written.
    AlreadySeeded,
    Seeded { community_id: String, post_id: String },
}

/// Bootstrap an empty store with a welcome community owned by `user` and a
/// first post in it.
pub async fn ensure_defaults(store: &dyn DocumentStore, user: &CurrentUser) -> Result<SeedOutcome, CoreError> {
    if !store.read_all(GROUPS).await?.is_empty() {
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let community_id = store.create(GROUPS, community_document(user, WELCOME_COMMUNITY)).await?;
    let post_id = store
        .create(POSTS, post_document(&community_id, WELCOME_COMMUNITY, user, WELCOME_POST))
        .await?;

    info!("Seeded '{}' ({}) for {}", WELCOME_COMMUNITY, community_id, user.id);
    Ok(SeedOutcome::Seeded { community_id, post_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_store::SqliteStore;

    #[tokio::test]
    async fn seeds_once() {
        let store = SqliteStore::in_memory().unwrap();
        let user = CurrentUser::new("u1");

        let first = ensure_defaults(&store, &user).await.unwrap();
        let SeedOutcome::Seeded { community_id, .. } = first else {
            panic!("expected a fresh seed, got {:?}", first);
        };

        let groups = store.read_all(GROUPS).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, community_id);
        assert_eq!(store.read_all(POSTS).await.unwrap().len(), 1);

        assert_eq!(ensure_defaults(&store, &user).await.unwrap(), SeedOutcome::AlreadySeeded);
        assert_eq!(store.read_all(GROUPS).await.unwrap().len(), 1);
    }
}
