use std::sync::Arc;

use harmony_store::{Direction, Document, DocumentStore, NewDocument, Query};
use harmony_types::api::CurrentUser;
use harmony_types::models::GratitudeEntry;

use crate::error::{CoreError, ValidationError};

pub fn gratitude_collection(user_id: &str) -> String {
    format!("users/{}/gratitude", user_id)
}

pub struct GratitudeJournal {
    store: Arc<dyn DocumentStore>,
}

impl GratitudeJournal {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, user: &CurrentUser, entry: &str) -> Result<String, CoreError> {
        if entry.trim().is_empty() {
            return Err(ValidationError::BlankText.into());
        }
        let doc = NewDocument::new().set("entry", entry).server_timestamp("timestamp");
        Ok(self.store.create(&gratitude_collection(&user.id), doc).await?)
    }

    /// Newest first.
    pub async fn entries(&self, user: &CurrentUser) -> Result<Vec<GratitudeEntry>, CoreError> {
        let collection = gratitude_collection(&user.id);
        let docs = self.store.read_all(&collection).await?;
        let ordered = Query::collection(collection)
            .order_by("timestamp", Direction::Desc)
            .apply(docs);
        Ok(Document::decode_all(&ordered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_store::SqliteStore;

    #[tokio::test]
    async fn records_and_lists_newest_first() {
        let journal = GratitudeJournal::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let user = CurrentUser::new("u1");

        assert!(journal.record(&user, "  ").await.unwrap_err().is_validation());
        journal.record(&user, "Morning coffee").await.unwrap();
        journal.record(&user, "A long walk").await.unwrap();

        let entries: Vec<String> = journal
            .entries(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.entry)
            .collect();
        assert_eq!(entries, vec!["A long walk", "Morning coffee"]);
    }
}
