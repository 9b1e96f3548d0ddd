//! Capability traits for the two external stores the app talks to, plus a
//! SQLite-backed implementation of both.
//!
//! Components only ever see `Arc<dyn DocumentStore>` / `Arc<dyn AppendLog>`,
//! so tests and alternative backends can be swapped in at construction time.

pub mod dispatcher;
pub mod document;
pub mod error;
pub mod query;
pub mod sqlite;
pub mod subscription;

use async_trait::async_trait;
use serde_json::Value;

pub use dispatcher::{ChangeNotice, Dispatcher};
pub use document::{Document, FieldUpdate, LogEntry, NewDocument};
pub use error::StoreError;
pub use query::{Direction, Filter, Query};
pub use sqlite::SqliteStore;
pub use subscription::Subscription;

/// Document database: named collections of JSON documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its generated id.
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Every document in the collection, in insertion order.
    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Apply all updates atomically. Fails with `NotFound` if the document
    /// does not exist.
    async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<(), StoreError>;

    /// Live query. The first item is the current result set; every later
    /// change to the collection yields a fresh full snapshot.
    async fn live_query(&self, query: Query) -> Result<Subscription<Vec<Document>>, StoreError>;
}

/// Realtime append log: paths holding push-keyed children.
#[async_trait]
pub trait AppendLog: Send + Sync {
    /// Append a child under `path`; returns the generated key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Live view of all children under `path`, in push order.
    async fn subscribe(&self, path: &str) -> Result<Subscription<Vec<LogEntry>>, StoreError>;
}
