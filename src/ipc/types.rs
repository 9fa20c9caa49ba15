use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::store::SqliteStore;
use crate::timetable::TimetableGrid;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-process daemon state. Grids are the in-memory editing copies, one
/// per (classId, academicYear), independent of any other editor's.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub grids: HashMap<(String, String), TimetableGrid>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            store: None,
            grids: HashMap::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
