use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::StoreError;

/// A stored document: its id plus a JSON object of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Look up a dot-separated field path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }

    /// Decode into an entity type, with the document id injected as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| StoreError::Decode {
            id: self.id.clone(),
            source,
        })
    }

    /// Decode a snapshot, skipping (and logging) documents that don't fit `T`.
    pub fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Vec<T> {
        docs.iter()
            .filter_map(|doc| match doc.decode() {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!("Skipping document: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Fields for a document about to be created.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub fields: Map<String, Value>,
    /// Paths that receive the server timestamp (epoch millis) on write.
    pub server_timestamps: Vec<String>,
}

impl NewDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn server_timestamp(mut self, path: &str) -> Self {
        self.server_timestamps.push(path.to_string());
        self
    }

    pub(crate) fn into_fields(self, now_ms: i64) -> Result<Map<String, Value>, StoreError> {
        let mut fields = self.fields;
        for path in &self.server_timestamps {
            *slot_mut(&mut fields, path)? = Value::from(now_ms);
        }
        Ok(fields)
    }
}

/// A single field mutation. Paths are dot-separated; missing intermediate
/// objects are created.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set { path: String, value: Value },
    /// Append each value not already present in the array.
    ArrayUnion { path: String, values: Vec<Value> },
    /// Remove every occurrence of each value.
    ArrayRemove { path: String, values: Vec<Value> },
    Increment { path: String, by: i64 },
    /// Subtract, never going below zero.
    Decrement { path: String, by: i64 },
    ServerTimestamp { path: String },
    /// Set `path` to the current length of the array at `array`, as it
    /// stands after the updates before this one.
    ArrayLength { path: String, array: String },
}

impl FieldUpdate {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn array_union(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::ArrayUnion {
            path: path.into(),
            values,
        }
    }

    pub fn array_remove(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::ArrayRemove {
            path: path.into(),
            values,
        }
    }

    pub fn increment(path: impl Into<String>, by: i64) -> Self {
        Self::Increment { path: path.into(), by }
    }

    pub fn decrement(path: impl Into<String>, by: i64) -> Self {
        Self::Decrement { path: path.into(), by }
    }

    pub fn server_timestamp(path: impl Into<String>) -> Self {
        Self::ServerTimestamp { path: path.into() }
    }

    pub fn array_length(path: impl Into<String>, array: impl Into<String>) -> Self {
        Self::ArrayLength {
            path: path.into(),
            array: array.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. }
            | Self::ArrayUnion { path, .. }
            | Self::ArrayRemove { path, .. }
            | Self::Increment { path, .. }
            | Self::Decrement { path, .. }
            | Self::ServerTimestamp { path }
            | Self::ArrayLength { path, .. } => path,
        }
    }
}

/// Apply updates in order. Either all of them land or `fields` should be
/// discarded by the caller.
pub fn apply_updates(
    fields: &mut Map<String, Value>,
    updates: &[FieldUpdate],
    now_ms: i64,
) -> Result<(), StoreError> {
    for update in updates {
        if let FieldUpdate::ArrayLength { path, array } = update {
            let len = lookup(fields, array).and_then(Value::as_array).map_or(0, Vec::len);
            *slot_mut(fields, path)? = Value::from(len as u64);
            continue;
        }

        let slot = slot_mut(fields, update.path())?;
        match update {
            FieldUpdate::Set { value, .. } => *slot = value.clone(),
            FieldUpdate::ArrayUnion { values, .. } => {
                let array = array_mut(slot);
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
            }
            FieldUpdate::ArrayRemove { values, .. } => {
                let array = array_mut(slot);
                array.retain(|v| !values.contains(v));
            }
            FieldUpdate::Increment { by, .. } => {
                let current = slot.as_i64().unwrap_or(0);
                *slot = Value::from(current.saturating_add(*by));
            }
            FieldUpdate::Decrement { by, .. } => {
                let current = slot.as_i64().unwrap_or(0);
                *slot = Value::from(current.saturating_sub(*by).max(0));
            }
            FieldUpdate::ServerTimestamp { .. } => *slot = Value::from(now_ms),
            FieldUpdate::ArrayLength { .. } => {}
        }
    }
    Ok(())
}

fn lookup<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn array_mut(slot: &mut Value) -> &mut Vec<Value> {
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(array) => array,
        _ => unreachable!("slot was just replaced with an array"),
    }
}

fn slot_mut<'a>(fields: &'a mut Map<String, Value>, path: &str) -> Result<&'a mut Value, StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(StoreError::InvalidPath(path.to_string()));
    };

    let mut current = fields;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };
        current = next;
    }

    Ok(current.entry(last.to_string()).or_insert(Value::Null))
}

/// One child of an append-log path.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub key: String,
    pub value: Value,
    /// Server timestamp, epoch millis.
    pub timestamp: i64,
}

impl LogEntry {
    /// Decode an object value, with `key` and `timestamp` injected.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut fields = match &self.value {
            Value::Object(fields) => fields.clone(),
            _ => return Err(StoreError::NotAnObject),
        };
        fields.insert("key".to_string(), Value::String(self.key.clone()));
        fields.insert("timestamp".to_string(), Value::from(self.timestamp));
        serde_json::from_value(Value::Object(fields)).map_err(|source| StoreError::Decode {
            id: self.key.clone(),
            source,
        })
    }
}
