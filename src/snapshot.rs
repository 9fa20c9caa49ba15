//! Snapshot backup/restore coordinator.
//!
//! A snapshot is one JSON document holding every registered collection's
//! rows plus metadata. Reading is best-effort per collection: a collection
//! that fails to fetch is recorded and included as empty rather than
//! aborting the whole backup. Restore mirrors that policy, replaying each
//! collection with idempotent upserts and summarizing per-collection
//! failures instead of rolling back.
//!
//! Restoring overwrites any existing rows that share an `id` with the
//! document. Callers are expected to confirm with the user before invoking
//! [`restore_document`].

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{self, REGISTERED_COLLECTIONS};
use crate::store::{CollectionStore, Record};

/// Document shape version. Bump when the wire shape changes.
pub const FORMAT_VERSION: &str = "1.0";

const RECOGNIZED_VERSIONS: [&str; 1] = [FORMAT_VERSION];

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(rename = "totalRecords")]
    pub total_records: u64,
    #[serde(rename = "createdBy", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

/// The exported document. Immutable once built; restore never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub version: String,
    pub timestamp: String,
    pub tables: BTreeMap<String, Vec<Record>>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone)]
pub struct CollectionReadError {
    pub collection: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CollectionWriteError {
    pub collection: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    pub collections_restored: usize,
    pub collections_errored: usize,
    pub records_written: u64,
    pub errors: Vec<CollectionWriteError>,
}

/// Fetches every registered collection. A failed read is logged, recorded,
/// and yields an empty sequence for that collection only; the remaining
/// collections are still read. Callers observe completeness through the
/// document's `totalRecords`, so this must stay best-effort.
pub fn read_all_collections(
    store: &dyn CollectionStore,
) -> (BTreeMap<String, Vec<Record>>, Vec<CollectionReadError>) {
    let mut tables = BTreeMap::new();
    let mut errors = Vec::new();
    for name in REGISTERED_COLLECTIONS {
        match store.select_all(name) {
            Ok(rows) => {
                tables.insert(name.to_string(), rows);
            }
            Err(e) => {
                warn!("backup: reading {} failed, treating as empty: {}", name, e);
                errors.push(CollectionReadError {
                    collection: name.to_string(),
                    message: e.to_string(),
                });
                tables.insert(name.to_string(), Vec::new());
            }
        }
    }
    (tables, errors)
}

/// Assembles reader output into a document: sums record counts, stamps
/// version and creation time. No I/O.
pub fn build_document(
    tables: BTreeMap<String, Vec<Record>>,
    created_by: Option<String>,
) -> SnapshotDocument {
    let total_records = tables.values().map(|rows| rows.len() as u64).sum();
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    SnapshotDocument {
        version: FORMAT_VERSION.to_string(),
        timestamp: now.clone(),
        tables,
        metadata: SnapshotMetadata {
            total_records,
            created_by,
            created_at: now,
        },
    }
}

/// One-call backup: read everything, assemble the document.
pub fn create_snapshot(
    store: &dyn CollectionStore,
    created_by: Option<String>,
) -> (SnapshotDocument, Vec<CollectionReadError>) {
    let (tables, errors) = read_all_collections(store);
    let doc = build_document(tables, created_by);
    info!(
        "backup: snapshot built, {} records across {} collections ({} read errors)",
        doc.metadata.total_records,
        doc.tables.len(),
        errors.len()
    );
    (doc, errors)
}

pub fn to_json_string(doc: &SnapshotDocument) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| SnapshotError::InvalidFormat(format!("document not serializable: {}", e)))
}

/// Parses and structurally validates an incoming document. Anything that is
/// not the exported shape (missing version/timestamp/tables, tables not an
/// object of arrays of objects, unrecognized version) is `InvalidFormat`.
pub fn parse_document(text: &str) -> Result<SnapshotDocument, SnapshotError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SnapshotError::InvalidFormat(format!("not valid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| SnapshotError::InvalidFormat("top level is not an object".to_string()))?;
    if !obj.get("version").map(|v| v.is_string()).unwrap_or(false) {
        return Err(SnapshotError::InvalidFormat(
            "missing `version` string".to_string(),
        ));
    }
    if !obj.get("timestamp").map(|v| v.is_string()).unwrap_or(false) {
        return Err(SnapshotError::InvalidFormat(
            "missing `timestamp` string".to_string(),
        ));
    }
    match obj.get("tables") {
        Some(serde_json::Value::Object(tables)) => {
            for (name, rows) in tables {
                let ok = rows
                    .as_array()
                    .map(|a| a.iter().all(|r| r.is_object()))
                    .unwrap_or(false);
                if !ok {
                    return Err(SnapshotError::InvalidFormat(format!(
                        "`tables.{}` is not an array of row objects",
                        name
                    )));
                }
            }
        }
        _ => {
            return Err(SnapshotError::InvalidFormat(
                "missing `tables` object".to_string(),
            ))
        }
    }

    let doc: SnapshotDocument = serde_json::from_value(value)
        .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;
    validate_document(&doc)?;
    Ok(doc)
}

/// Version gate, shared by the parse path and documents built in-process.
pub fn validate_document(doc: &SnapshotDocument) -> Result<(), SnapshotError> {
    if !RECOGNIZED_VERSIONS.contains(&doc.version.as_str()) {
        return Err(SnapshotError::InvalidFormat(format!(
            "unrecognized version: {}",
            doc.version
        )));
    }
    Ok(())
}

/// Replays the document's collections into the store.
///
/// Validation happens before any write; an unrecognized version leaves the
/// store untouched. Collections replay in registry order so rows that
/// reference earlier collections land after them. A failure in one
/// collection is counted and does not stop the rest. Document tables that
/// are not in the registry are skipped and counted as errors.
pub fn restore_document(
    store: &dyn CollectionStore,
    doc: &SnapshotDocument,
) -> Result<RestoreSummary, SnapshotError> {
    validate_document(doc)?;

    let mut summary = RestoreSummary::default();
    for name in REGISTERED_COLLECTIONS {
        let Some(rows) = doc.tables.get(name) else {
            continue;
        };
        if rows.is_empty() {
            continue;
        }
        match store.upsert(name, rows) {
            Ok(()) => {
                summary.collections_restored += 1;
                summary.records_written += rows.len() as u64;
            }
            Err(e) => {
                warn!("restore: {} failed, continuing: {}", name, e);
                summary.collections_errored += 1;
                summary.errors.push(CollectionWriteError {
                    collection: name.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    for (name, rows) in &doc.tables {
        if !registry::is_registered(name) && !rows.is_empty() {
            summary.collections_errored += 1;
            summary.errors.push(CollectionWriteError {
                collection: name.clone(),
                message: "not a registered collection".to_string(),
            });
        }
    }

    info!(
        "restore: {} collections restored, {} errored, {} records written",
        summary.collections_restored, summary.collections_errored, summary.records_written
    );
    Ok(summary)
}
