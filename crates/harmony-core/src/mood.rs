use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use harmony_store::{Direction, Document, DocumentStore, NewDocument, Query, StoreError};
use harmony_types::api::CurrentUser;
use harmony_types::models::{Mood, MoodEntry};

use crate::error::{CoreError, ValidationError};

pub fn moods_collection(user_id: &str) -> String {
    format!("users/{}/moods", user_id)
}

/// Append-only mood journal, one collection per user.
pub struct MoodLog {
    store: Arc<dyn DocumentStore>,
}

impl MoodLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, user: &CurrentUser, mood: &str, note: &str) -> Result<String, CoreError> {
        let parsed: Mood = mood
            .trim()
            .parse()
            .map_err(|_| ValidationError::UnknownMood(mood.to_string()))?;

        let doc = NewDocument::new()
            .set("mood", serde_json::to_value(parsed).map_err(StoreError::from)?)
            .set("note", note)
            .server_timestamp("timestamp");
        let id = self.store.create(&moods_collection(&user.id), doc).await?;
        debug!("{} recorded mood {}", user.id, parsed);
        Ok(id)
    }

    /// Entries from the last `window_days` days, oldest first.
    pub async fn history(&self, user: &CurrentUser, window_days: u32) -> Result<Vec<MoodEntry>, CoreError> {
        let since = Utc::now() - Duration::days(i64::from(window_days));
        self.history_since(user, since).await
    }

    /// Entries created at or after `since`, oldest first.
    pub async fn history_since(&self, user: &CurrentUser, since: DateTime<Utc>) -> Result<Vec<MoodEntry>, CoreError> {
        let collection = moods_collection(&user.id);
        let docs = self.store.read_all(&collection).await?;
        let matching = Query::collection(collection)
            .where_gte("timestamp", since.timestamp_millis())
            .order_by("timestamp", Direction::Asc)
            .apply(docs);
        Ok(Document::decode_all(&matching))
    }
}

/// Chart value for an entry; unknown categories map to 0.
pub fn project(entry: &MoodEntry) -> u8 {
    entry.mood.ordinal()
}

/// (time, value) points for the mood chart.
pub fn chart(entries: &[MoodEntry]) -> Vec<(DateTime<Utc>, u8)> {
    entries.iter().map(|e| (e.timestamp, project(e))).collect()
}
