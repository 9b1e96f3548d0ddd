use crate::Database;
use crate::models::{DocumentRow, LogEntryRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Documents --

    pub fn insert_document(&self, collection: &str, id: &str, fields: &str, now_ms: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, fields, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                rusqlite::params![collection, id, fields, now_ms],
            )?;
            Ok(())
        })
    }

    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| query_document(conn, collection, id))
    }

    /// All documents of a collection in insertion order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, collection, id, fields, created_at, updated_at
                 FROM documents
                 WHERE collection = ?1
                 ORDER BY seq ASC",
            )?;

            let rows = stmt
                .query_map([collection], document_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Read-modify-write a document's fields inside one transaction.
    /// `f` receives the stored JSON text and returns the replacement.
    /// Returns false when the document does not exist.
    pub fn modify_document<F>(&self, collection: &str, id: &str, now_ms: i64, f: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(existing) = query_document(&tx, collection, id)? else {
                return Ok(false);
            };

            let updated = f(&existing.fields)?;
            tx.execute(
                "UPDATE documents SET fields = ?1, updated_at = ?2 WHERE seq = ?3",
                rusqlite::params![updated, now_ms, existing.seq],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Append log --

    pub fn push_log_entry(&self, path: &str, key: &str, value: &str, timestamp_ms: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO log_entries (path, key, value, timestamp) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![path, key, value, timestamp_ms],
            )?;
            Ok(())
        })
    }

    /// All children of a log path in push order.
    pub fn list_log_entries(&self, path: &str) -> Result<Vec<LogEntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, path, key, value, timestamp
                 FROM log_entries
                 WHERE path = ?1
                 ORDER BY seq ASC",
            )?;

            let rows = stmt
                .query_map([path], |row| {
                    Ok(LogEntryRow {
                        seq: row.get(0)?,
                        path: row.get(1)?,
                        key: row.get(2)?,
                        value: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<DocumentRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, collection, id, fields, created_at, updated_at
         FROM documents
         WHERE collection = ?1 AND id = ?2",
    )?;

    let row = stmt
        .query_row([collection, id], document_from_row)
        .optional()?;

    Ok(row)
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        seq: row.get(0)?,
        collection: row.get(1)?,
        id: row.get(2)?,
        fields: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
