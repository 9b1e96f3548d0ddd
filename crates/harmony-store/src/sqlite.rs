use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use harmony_db::Database;
use harmony_db::models::DocumentRow;

use crate::dispatcher::{ChangeNotice, Dispatcher};
use crate::document::{Document, FieldUpdate, LogEntry, NewDocument, apply_updates};
use crate::error::StoreError;
use crate::query::Query;
use crate::subscription::{Subscription, SubscriptionSender};
use crate::{AppendLog, DocumentStore};

/// Both store capabilities over one SQLite database. Every write notifies
/// the dispatcher; live queries and log subscriptions re-read on a matching
/// notice and push a full snapshot.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run blocking DB work off the async runtime
    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
    }

    async fn query_snapshot(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let docs = self.read_all(&query.collection).await?;
        Ok(query.apply(docs))
    }

    async fn log_snapshot(&self, path: &str) -> Result<Vec<LogEntry>, StoreError> {
        let path = path.to_string();
        let rows = self.blocking(move |db| db.list_log_entries(&path)).await?;
        rows.into_iter()
            .map(|row| -> Result<LogEntry, StoreError> {
                Ok(LogEntry {
                    key: row.key,
                    value: serde_json::from_str(&row.value)?,
                    timestamp: row.timestamp,
                })
            })
            .collect()
    }

    /// Spawn the task that feeds one subscription: an initial snapshot, then
    /// one per matching change notice, until the subscriber cancels.
    fn spawn_feeder<T, F, Fut>(&self, topic: ChangeNotice, read: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let (tx, sub) = Subscription::channel();
        // Subscribe before the first read so no change can slip between them.
        let mut notices = self.dispatcher.subscribe();

        tokio::spawn(async move {
            debug!("Live feed on {:?} started", topic);
            if !feed(&tx, read().await) {
                return;
            }

            loop {
                tokio::select! {
                    _ = tx.cancelled() => break,
                    notice = notices.recv() => match notice {
                        Ok(notice) if notice == topic => {
                            if !feed(&tx, read().await) {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(n)) => {
                            warn!("Change notices lagged by {} on {:?}, re-reading", n, topic);
                            if !feed(&tx, read().await) {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("Live feed on {:?} stopped", topic);
        });

        sub
    }
}

/// Push one snapshot; false means the feed should stop.
fn feed<T>(tx: &SubscriptionSender<T>, snapshot: Result<T, StoreError>) -> bool {
    match snapshot {
        Ok(snapshot) => tx.send(Ok(snapshot)),
        Err(e) => {
            warn!("Live feed read failed: {}", e);
            tx.send(Err(e));
            false
        }
    }
}

fn document_from_row(row: DocumentRow) -> Result<Document, StoreError> {
    Ok(Document {
        id: row.id,
        fields: serde_json::from_str(&row.fields)?,
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        let now = now_ms();
        let fields = serde_json::to_string(&doc.into_fields(now)?)?;
        let id = Uuid::new_v4().to_string();

        let (c, i) = (collection.to_string(), id.clone());
        self.blocking(move |db| db.insert_document(&c, &i, &fields, now)).await?;

        debug!("Created {}/{}", collection, id);
        self.dispatcher.notify(ChangeNotice::Collection(collection.to_string()));
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let (c, i) = (collection.to_string(), id.to_string());
        let row = self.blocking(move |db| db.get_document(&c, &i)).await?;
        row.map(document_from_row).transpose()
    }

    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let c = collection.to_string();
        let rows = self.blocking(move |db| db.list_documents(&c)).await?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
        let now = now_ms();
        let (c, i) = (collection.to_string(), id.to_string());

        let found = self
            .blocking(move |db| {
                db.modify_document(&c, &i, now, |stored| {
                    let mut fields: Map<String, Value> = serde_json::from_str(stored)?;
                    apply_updates(&mut fields, &updates, now)?;
                    Ok(serde_json::to_string(&fields)?)
                })
            })
            .await?;

        if !found {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        self.dispatcher.notify(ChangeNotice::Collection(collection.to_string()));
        Ok(())
    }

    async fn live_query(&self, query: Query) -> Result<Subscription<Vec<Document>>, StoreError> {
        let topic = ChangeNotice::Collection(query.collection.clone());
        let store = self.clone();
        Ok(self.spawn_feeder(topic, move || {
            let store = store.clone();
            let query = query.clone();
            async move { store.query_snapshot(&query).await }
        }))
    }
}

#[async_trait]
impl AppendLog for SqliteStore {
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let now = now_ms();
        let key = Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(&value)?;

        let (p, k) = (path.to_string(), key.clone());
        self.blocking(move |db| db.push_log_entry(&p, &k, &encoded, now)).await?;

        self.dispatcher.notify(ChangeNotice::LogPath(path.to_string()));
        Ok(key)
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription<Vec<LogEntry>>, StoreError> {
        let topic = ChangeNotice::LogPath(path.to_string());
        let store = self.clone();
        let path = path.to_string();
        Ok(self.spawn_feeder(topic, move || {
            let store = store.clone();
            let path = path.clone();
            async move { store.log_snapshot(&path).await }
        }))
    }
}
