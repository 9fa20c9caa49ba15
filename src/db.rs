use rusqlite::Connection;
use std::path::Path;

use crate::registry::REGISTERED_COLLECTIONS;
use crate::store::SqliteStore;

pub const DB_FILE_NAME: &str = "college.sqlite3";

/// Opens (creating if needed) the workspace database and bootstraps one
/// document table per registered collection. Rows are opaque JSON keyed by
/// the record's `id`, so adding a collection only needs a registry entry.
pub fn open_workspace(workspace: &Path) -> anyhow::Result<SqliteStore> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    for name in REGISTERED_COLLECTIONS {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}(
                    id TEXT PRIMARY KEY,
                    doc TEXT NOT NULL
                )",
                name
            ),
            [],
        )?;
    }

    Ok(SqliteStore::new(conn))
}
