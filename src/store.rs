//! Backing-store abstraction.
//!
//! Every collection is a bag of opaque JSON records keyed by a unique `id`
//! field. The snapshot coordinator and the timetable persist layer talk to
//! the store only through [`CollectionStore`], so tests can substitute a
//! double for the SQLite implementation.

use rusqlite::Connection;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry;

/// One row of a collection: field name -> JSON value. The store does not
/// interpret fields beyond the `id` key used for idempotent upserts.
pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("record in {collection} has no string or numeric `id` field")]
    MissingId { collection: String },
    #[error("invalid filter field name: {0}")]
    InvalidField(String),
    #[error("stored row {id} in {collection} is not a JSON object")]
    Corrupt { collection: String, id: String },
}

/// Equality filter on a top-level record field, ANDed together.
pub type FieldFilter<'a> = (&'a str, &'a str);

pub trait CollectionStore {
    fn select_all(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Insert-or-update every record, keyed by its `id` field. Replaying the
    /// same batch twice leaves the collection unchanged.
    fn upsert(&self, collection: &str, records: &[Record]) -> Result<(), StoreError>;

    /// Delete rows whose fields match all filters. Returns the number of
    /// rows removed.
    fn delete_where(
        &self,
        collection: &str,
        filters: &[FieldFilter<'_>],
    ) -> Result<usize, StoreError>;

    /// Delete matching rows and insert `records` as a single atomic step.
    fn replace_where(
        &self,
        collection: &str,
        filters: &[FieldFilter<'_>],
        records: &[Record],
    ) -> Result<(), StoreError>;
}

/// Extracts the replay key from a record. String ids are used as-is,
/// numeric ids are stored in their decimal form.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        SqliteStore { conn }
    }

    fn check_collection(collection: &str) -> Result<(), StoreError> {
        // Collection names are interpolated into SQL, so only registry
        // members are accepted.
        if registry::is_registered(collection) {
            Ok(())
        } else {
            Err(StoreError::UnknownCollection(collection.to_string()))
        }
    }

    fn insert_records(
        conn: &Connection,
        collection: &str,
        records: &[Record],
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {}(id, doc) VALUES(?, ?)
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            collection
        );
        let mut stmt = conn.prepare(&sql)?;
        for record in records {
            let id = record_id(record).ok_or_else(|| StoreError::MissingId {
                collection: collection.to_string(),
            })?;
            let doc = Value::Object(record.clone()).to_string();
            stmt.execute((&id, &doc))?;
        }
        Ok(())
    }

    fn check_field(field: &str) -> Result<(), StoreError> {
        let ok = !field.is_empty()
            && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if ok {
            Ok(())
        } else {
            Err(StoreError::InvalidField(field.to_string()))
        }
    }

    /// Field names are validated and the JSON paths bound as parameters;
    /// filter input never reaches the SQL text.
    fn delete_rows(
        conn: &Connection,
        collection: &str,
        filters: &[FieldFilter<'_>],
    ) -> Result<usize, StoreError> {
        for (field, _) in filters {
            Self::check_field(field)?;
        }
        let mut sql = format!("DELETE FROM {}", collection);
        for i in 0..filters.len() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str("json_extract(doc, ?) = ?");
        }
        let paths: Vec<String> = filters.iter().map(|(f, _)| format!("$.{}", f)).collect();
        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(filters.len() * 2);
        for (path, (_, value)) in paths.iter().zip(filters) {
            params.push(path);
            params.push(value);
        }
        let deleted = conn.execute(&sql, params.as_slice())?;
        Ok(deleted)
    }
}

impl CollectionStore for SqliteStore {
    fn select_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        Self::check_collection(collection)?;
        let sql = format!("SELECT id, doc FROM {} ORDER BY rowid", collection);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, doc) in rows {
            match serde_json::from_str::<Value>(&doc) {
                Ok(Value::Object(map)) => records.push(map),
                _ => {
                    return Err(StoreError::Corrupt {
                        collection: collection.to_string(),
                        id,
                    })
                }
            }
        }
        Ok(records)
    }

    fn upsert(&self, collection: &str, records: &[Record]) -> Result<(), StoreError> {
        Self::check_collection(collection)?;
        let tx = self.conn.unchecked_transaction()?;
        Self::insert_records(&tx, collection, records)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_where(
        &self,
        collection: &str,
        filters: &[FieldFilter<'_>],
    ) -> Result<usize, StoreError> {
        Self::check_collection(collection)?;
        Self::delete_rows(&self.conn, collection, filters)
    }

    fn replace_where(
        &self,
        collection: &str,
        filters: &[FieldFilter<'_>],
        records: &[Record],
    ) -> Result<(), StoreError> {
        Self::check_collection(collection)?;
        let tx = self.conn.unchecked_transaction()?;
        Self::delete_rows(&tx, collection, filters)?;
        Self::insert_records(&tx, collection, records)?;
        tx.commit()?;
        Ok(())
    }
}
