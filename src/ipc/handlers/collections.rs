//! Backing-store primitives over IPC: what screens (and tests) use to read
//! and write individual collections.

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::registry::REGISTERED_COLLECTIONS;
use crate::store::{CollectionStore, Record, StoreError};
use serde_json::{json, Value};

fn get_required_str(params: &Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing {}", key))
}

fn handle_collections_list(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "collections": REGISTERED_COLLECTIONS.to_vec() }),
    )
}

fn handle_collections_fetch_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match get_required_str(&req.params, "collection") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match store.select_all(&collection) {
        Ok(rows) => ok(
            &req.id,
            json!({ "collection": collection, "count": rows.len(), "records": rows }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn parse_records(params: &Value) -> Result<Vec<Record>, String> {
    let raw = params
        .get("records")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "missing records array".to_string())?;
    let mut records = Vec::with_capacity(raw.len());
    for value in raw {
        match value {
            Value::Object(map) => records.push(map.clone()),
            _ => return Err("records must be objects".to_string()),
        }
    }
    Ok(records)
}

fn handle_collections_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match get_required_str(&req.params, "collection") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let records = match parse_records(&req.params) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match store.upsert(&collection, &records) {
        Ok(()) => ok(
            &req.id,
            json!({ "ok": true, "collection": collection, "upserted": records.len() }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "collection": collection })),
        ),
    }
}

fn handle_collections_delete_where(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let collection = match get_required_str(&req.params, "collection") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let field = match get_required_str(&req.params, "field") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let value = match get_required_str(&req.params, "value") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match store.delete_where(&collection, &[(field.as_str(), value.as_str())]) {
        Ok(deleted) => ok(
            &req.id,
            json!({ "ok": true, "collection": collection, "deleted": deleted }),
        ),
        Err(e @ StoreError::InvalidField(_)) => err(&req.id, "bad_params", e.to_string(), None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "collection": collection })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "collections.list" => Some(handle_collections_list(state, req)),
        "collections.fetchAll" => Some(handle_collections_fetch_all(state, req)),
        "collections.upsert" => Some(handle_collections_upsert(state, req)),
        "collections.deleteWhere" => Some(handle_collections_delete_where(state, req)),
        _ => None,
    }
}
