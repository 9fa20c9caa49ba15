//! Timetable editing surface. A grid must be loaded (hydrated from the
//! store) before edits; edits are in-memory until `timetable.save`, which
//! persists the full grid as a replace for its (classId, academicYear).

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{self, SlotAssignment, TimetableError, TimetableGrid};
use serde_json::json;

fn grid_key(req: &Request) -> Result<(String, String), serde_json::Value> {
    let class_id = req
        .params
        .get("classId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", "missing classId", None))?;
    let academic_year = req
        .params
        .get("academicYear")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", "missing academicYear", None))?;
    Ok((class_id, academic_year))
}

fn coords(req: &Request) -> Result<(u8, u8), serde_json::Value> {
    let day = req
        .params
        .get("day")
        .and_then(|v| v.as_u64())
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| err(&req.id, "bad_params", "missing day", None))?;
    let period = req
        .params
        .get("period")
        .and_then(|v| v.as_u64())
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| err(&req.id, "bad_params", "missing period", None))?;
    Ok((day, period))
}

fn grid_json(grid: &TimetableGrid) -> serde_json::Value {
    json!({
        "classId": grid.class_id,
        "academicYear": grid.academic_year,
        "slots": grid.slots()
    })
}

fn timetable_error(id: &str, e: TimetableError) -> serde_json::Value {
    match e {
        TimetableError::Validation(msg) => err(id, "validation_failed", msg, None),
        TimetableError::Store(e) => err(id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let key = match grid_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match timetable::load_grid(store, &key.0, &key.1) {
        Ok(grid) => {
            let payload = grid_json(&grid);
            state.grids.insert(key, grid);
            ok(&req.id, payload)
        }
        Err(e) => timetable_error(&req.id, e),
    }
}

fn loaded_grid<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut TimetableGrid, serde_json::Value> {
    let key = grid_key(req)?;
    state.grids.get_mut(&key).ok_or_else(|| {
        err(
            &req.id,
            "not_loaded",
            "load the timetable before editing it",
            None,
        )
    })
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match loaded_grid(state, req) {
        Ok(grid) => {
            let payload = grid_json(grid);
            ok(&req.id, payload)
        }
        Err(e) => e,
    }
}

fn handle_set_slot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (day, period) = match coords(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match req.params.get("courseId").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing courseId", None),
    };
    let assignment = SlotAssignment {
        course_id,
        teacher_id: req
            .params
            .get("teacherId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        room: req
            .params
            .get("room")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        is_lab: req
            .params
            .get("isLab")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        double_period: req
            .params
            .get("doublePeriod")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    };

    let grid = match loaded_grid(state, req) {
        Ok(g) => g,
        Err(e) => return e,
    };
    match grid.set_slot(day, period, assignment) {
        Ok(()) => ok(&req.id, grid_json(grid)),
        Err(e) => timetable_error(&req.id, e),
    }
}

fn handle_clear_slot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (day, period) = match coords(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grid = match loaded_grid(state, req) {
        Ok(g) => g,
        Err(e) => return e,
    };
    match grid.clear_slot(day, period) {
        Ok(()) => ok(&req.id, grid_json(grid)),
        Err(e) => timetable_error(&req.id, e),
    }
}

fn handle_check_clash(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (day, period) = match coords(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match req.params.get("kind").and_then(|v| v.as_str()) {
        Some("teacher") => "teacher",
        Some("room") => "room",
        _ => {
            return err(
                &req.id,
                "bad_params",
                "kind must be `teacher` or `room`",
                None,
            )
        }
    };
    let value = match req.params.get("value").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing value", None),
    };
    let editing_course = req
        .params
        .get("courseId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let grid = match loaded_grid(state, req) {
        Ok(g) => g,
        Err(e) => return e,
    };
    let clash = if kind == "teacher" {
        grid.has_teacher_clash(day, period, &value, editing_course.as_deref())
    } else {
        grid.has_room_clash(day, period, &value, editing_course.as_deref())
    };
    ok(&req.id, json!({ "clash": clash }))
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match grid_key(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(grid) = state.grids.get(&key) else {
        return err(
            &req.id,
            "not_loaded",
            "load the timetable before saving it",
            None,
        );
    };
    match timetable::save_grid(store, grid) {
        Ok(slots_saved) => ok(&req.id, json!({ "ok": true, "slotsSaved": slots_saved })),
        Err(e) => timetable_error(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.load" => Some(handle_load(state, req)),
        "timetable.get" => Some(handle_get(state, req)),
        "timetable.setSlot" => Some(handle_set_slot(state, req)),
        "timetable.clearSlot" => Some(handle_clear_slot(state, req)),
        "timetable.checkClash" => Some(handle_check_clash(state, req)),
        "timetable.save" => Some(handle_save(state, req)),
        _ => None,
    }
}
