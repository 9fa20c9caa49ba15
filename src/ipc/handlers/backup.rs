//! Backup/restore surface: create into the catalog, export to a caller
//! path, list/delete cataloged files, and restore from catalog, file, or
//! pasted JSON.
//!
//! Restore overwrites rows sharing an `id` with the document; the UI is
//! expected to confirm with the user before calling any restore method.

use crate::catalog;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::snapshot::{self, CollectionReadError, RestoreSummary};
use crate::store::SqliteStore;
use serde_json::json;
use std::path::PathBuf;

fn read_errors_json(errors: &[CollectionReadError]) -> serde_json::Value {
    json!(errors
        .iter()
        .map(|e| json!({ "collection": e.collection, "message": e.message }))
        .collect::<Vec<_>>())
}

fn summary_json(summary: &RestoreSummary) -> serde_json::Value {
    json!({
        "ok": true,
        "collectionsRestored": summary.collections_restored,
        "collectionsErrored": summary.collections_errored,
        "recordsWritten": summary.records_written,
        "errors": summary.errors
            .iter()
            .map(|e| json!({ "collection": e.collection, "message": e.message }))
            .collect::<Vec<_>>()
    })
}

fn created_by(req: &Request) -> Option<String> {
    req.params
        .get("createdBy")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn handle_backup_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(store), Some(workspace)) = (state.store.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let (doc, read_errors) = snapshot::create_snapshot(store, created_by(req));
    match catalog::save_snapshot(workspace, &doc) {
        Ok(file_name) => ok(
            &req.id,
            json!({
                "ok": true,
                "fileName": file_name,
                "totalRecords": doc.metadata.total_records,
                "readErrors": read_errors_json(&read_errors)
            }),
        ),
        Err(e) => err(&req.id, "io_failed", e.to_string(), None),
    }
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };

    let (doc, read_errors) = snapshot::create_snapshot(store, created_by(req));
    let text = match snapshot::to_json_string(&doc) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "invalid_format", e.to_string(), None),
    };
    if let Some(parent) = out_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path.to_string_lossy() })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out_path, text) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path.to_string_lossy() })),
        );
    }
    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path.to_string_lossy(),
            "totalRecords": doc.metadata.total_records,
            "readErrors": read_errors_json(&read_errors)
        }),
    )
}

fn handle_backup_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match catalog::list_backups(workspace) {
        Ok(backups) => ok(&req.id, json!({ "backups": backups })),
        Err(e) => err(&req.id, "io_failed", e.to_string(), None),
    }
}

fn handle_backup_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let file_name = match req.params.get("fileName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing fileName", None),
    };
    match catalog::delete_backup(workspace, &file_name) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "removed": removed })),
        Err(e) => err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "fileName": file_name })),
        ),
    }
}

fn restore_text(store: &SqliteStore, id: &str, text: &str) -> serde_json::Value {
    let doc = match snapshot::parse_document(text) {
        Ok(d) => d,
        Err(e) => return err(id, "invalid_format", e.to_string(), None),
    };
    match snapshot::restore_document(store, &doc) {
        Ok(summary) => ok(id, summary_json(&summary)),
        Err(e) => err(id, "invalid_format", e.to_string(), None),
    }
}

fn handle_backup_restore_local(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(store), Some(workspace)) = (state.store.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let file_name = match req.params.get("fileName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing fileName", None),
    };
    let text = match catalog::read_backup(workspace, &file_name) {
        Ok(t) => t,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "fileName": file_name })),
            )
        }
    };
    restore_text(store, &req.id, &text)
}

fn handle_backup_import_file(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let text = match std::fs::read_to_string(&in_path) {
        Ok(t) => t,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": in_path })),
            )
        }
    };
    restore_text(store, &req.id, &text)
}

fn handle_backup_import_text(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let text = match req.params.get("text").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing text", None),
    };
    restore_text(store, &req.id, &text)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.create" => Some(handle_backup_create(state, req)),
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.list" => Some(handle_backup_list(state, req)),
        "backup.delete" => Some(handle_backup_delete(state, req)),
        "backup.restoreLocal" => Some(handle_backup_restore_local(state, req)),
        "backup.importFile" => Some(handle_backup_import_file(state, req)),
        "backup.importText" => Some(handle_backup_import_text(state, req)),
        _ => None,
    }
}
