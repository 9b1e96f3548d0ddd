/// Database row types. These map directly to SQLite rows.
/// Field payloads stay as raw JSON text; decoding happens in harmony-store.

pub struct DocumentRow {
    pub seq: i64,
    pub collection: String,
    pub id: String,
    pub fields: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct LogEntryRow {
    pub seq: i64,
    pub path: String,
    pub key: String,
    pub value: String,
    pub timestamp: i64,
}
