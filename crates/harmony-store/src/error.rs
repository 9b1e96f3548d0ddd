use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("malformed document {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid field path '{0}'")]
    InvalidPath(String),

    #[error("fields must be a JSON object")]
    NotAnObject,

    #[error("subscription closed")]
    Closed,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(e.into())
    }
}
