use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            fields      TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL,
            UNIQUE(collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents(collection, seq);

        CREATE TABLE IF NOT EXISTS log_entries (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            path        TEXT NOT NULL,
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            timestamp   INTEGER NOT NULL,
            UNIQUE(path, key)
        );

        CREATE INDEX IF NOT EXISTS idx_log_entries_path
            ON log_entries(path, seq);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
