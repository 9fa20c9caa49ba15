//! Weekly timetable grid for one (class, academic year) pair.
//!
//! The grid is 5 days by 5 periods, edited slot-by-slot in memory and
//! persisted as a full replace: prior rows for the cohort/year are deleted
//! and the occupied slots reinserted inside one transaction. A two-period
//! lab occupies two consecutive periods on the same day; the second period
//! mirrors the first and carries `isLabContinuation`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{CollectionStore, Record, StoreError};

pub const DAYS: u8 = 5;
pub const PERIODS: u8 = 5;

pub const TIMETABLE_COLLECTION: &str = "timetable_slots";

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub day: u8,
    pub period: u8,
    #[serde(rename = "courseId")]
    pub course_id: Option<String>,
    #[serde(rename = "teacherId")]
    pub teacher_id: Option<String>,
    pub room: Option<String>,
    #[serde(rename = "isLab")]
    pub is_lab: bool,
    #[serde(rename = "isLabContinuation")]
    pub is_lab_continuation: bool,
}

impl TimetableSlot {
    fn empty(day: u8, period: u8) -> Self {
        TimetableSlot {
            day,
            period,
            course_id: None,
            teacher_id: None,
            room: None,
            is_lab: false,
            is_lab_continuation: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.course_id.is_none()
    }
}

/// A proposed assignment for one slot. `double_period` requests a
/// two-period lab starting at the addressed period.
#[derive(Debug, Clone)]
pub struct SlotAssignment {
    pub course_id: String,
    pub teacher_id: Option<String>,
    pub room: Option<String>,
    pub is_lab: bool,
    pub double_period: bool,
}

#[derive(Debug, Clone)]
pub struct TimetableGrid {
    pub class_id: String,
    pub academic_year: String,
    slots: Vec<TimetableSlot>,
}

fn check_coords(day: u8, period: u8) -> Result<(), TimetableError> {
    if day < 1 || day > DAYS {
        return Err(TimetableError::Validation(format!(
            "day must be 1..{}, got {}",
            DAYS, day
        )));
    }
    if period < 1 || period > PERIODS {
        return Err(TimetableError::Validation(format!(
            "period must be 1..{}, got {}",
            PERIODS, period
        )));
    }
    Ok(())
}

fn index(day: u8, period: u8) -> usize {
    (day as usize - 1) * PERIODS as usize + (period as usize - 1)
}

impl TimetableGrid {
    pub fn new(class_id: impl Into<String>, academic_year: impl Into<String>) -> Self {
        let mut slots = Vec::with_capacity((DAYS * PERIODS) as usize);
        for day in 1..=DAYS {
            for period in 1..=PERIODS {
                slots.push(TimetableSlot::empty(day, period));
            }
        }
        TimetableGrid {
            class_id: class_id.into(),
            academic_year: academic_year.into(),
            slots,
        }
    }

    pub fn get_slot(&self, day: u8, period: u8) -> Result<&TimetableSlot, TimetableError> {
        check_coords(day, period)?;
        Ok(&self.slots[index(day, period)])
    }

    pub fn slots(&self) -> &[TimetableSlot] {
        &self.slots
    }

    pub fn occupied_slots(&self) -> impl Iterator<Item = &TimetableSlot> {
        self.slots.iter().filter(|s| !s.is_empty())
    }

    /// Empties the other half of a two-period lab pair that the slot at
    /// (day, period) belongs to. The slot itself is left alone; callers
    /// overwrite or clear it next. A continuation must mirror a live
    /// predecessor, so no write path may leave half a pair behind.
    fn clear_lab_partner(&mut self, day: u8, period: u8) {
        let slot = self.slots[index(day, period)].clone();
        let Some(course) = slot.course_id.as_deref() else {
            return;
        };
        if slot.is_lab && !slot.is_lab_continuation && period < PERIODS {
            let next = &self.slots[index(day, period + 1)];
            if next.is_lab_continuation && next.course_id.as_deref() == Some(course) {
                self.slots[index(day, period + 1)] = TimetableSlot::empty(day, period + 1);
            }
        }
        if slot.is_lab_continuation && period > 1 {
            let prev = &self.slots[index(day, period - 1)];
            if prev.is_lab
                && !prev.is_lab_continuation
                && prev.course_id.as_deref() == Some(course)
            {
                self.slots[index(day, period - 1)] = TimetableSlot::empty(day, period - 1);
            }
        }
    }

    /// Replaces one slot. A two-period lab also writes the continuation at
    /// `period + 1` on the same day; starting one in the last period is a
    /// validation error and leaves the grid untouched. Overwriting either
    /// half of an existing two-period lab detaches its other half.
    pub fn set_slot(
        &mut self,
        day: u8,
        period: u8,
        assignment: SlotAssignment,
    ) -> Result<(), TimetableError> {
        check_coords(day, period)?;
        if assignment.double_period && !assignment.is_lab {
            return Err(TimetableError::Validation(
                "only a lab can span two periods".to_string(),
            ));
        }
        if assignment.double_period && period == PERIODS {
            return Err(TimetableError::Validation(
                "cannot start a two-period lab in the last period".to_string(),
            ));
        }

        self.clear_lab_partner(day, period);
        if assignment.double_period {
            self.clear_lab_partner(day, period + 1);
        }

        self.slots[index(day, period)] = TimetableSlot {
            day,
            period,
            course_id: Some(assignment.course_id.clone()),
            teacher_id: assignment.teacher_id.clone(),
            room: assignment.room.clone(),
            is_lab: assignment.is_lab,
            is_lab_continuation: false,
        };
        if assignment.double_period {
            self.slots[index(day, period + 1)] = TimetableSlot {
                day,
                period: period + 1,
                course_id: Some(assignment.course_id),
                teacher_id: assignment.teacher_id,
                room: assignment.room,
                is_lab: true,
                is_lab_continuation: true,
            };
        }
        Ok(())
    }

    /// Resets a slot to empty. Clearing either half of a two-period lab
    /// clears both halves; a dangling continuation has no meaning.
    pub fn clear_slot(&mut self, day: u8, period: u8) -> Result<(), TimetableError> {
        check_coords(day, period)?;
        self.clear_lab_partner(day, period);
        self.slots[index(day, period)] = TimetableSlot::empty(day, period);
        Ok(())
    }

    /// True iff the slot at (day, period) already has this teacher on a
    /// different assignment. Empty slots never clash; re-checking the slot
    /// being edited (same course) is not a clash. Only this grid is
    /// inspected; cross-cohort double-booking needs an aggregate index
    /// outside this model.
    pub fn has_teacher_clash(
        &self,
        day: u8,
        period: u8,
        teacher_id: &str,
        editing_course: Option<&str>,
    ) -> bool {
        self.slots.iter().any(|s| {
            s.day == day
                && s.period == period
                && s.teacher_id.as_deref() == Some(teacher_id)
                && s.course_id.is_some()
                && s.course_id.as_deref() != editing_course
        })
    }

    /// True iff a lab slot at (day, period) already uses this room for a
    /// different assignment.
    pub fn has_room_clash(
        &self,
        day: u8,
        period: u8,
        room: &str,
        editing_course: Option<&str>,
    ) -> bool {
        self.slots.iter().any(|s| {
            s.day == day
                && s.period == period
                && s.is_lab
                && s.room.as_deref() == Some(room)
                && s.course_id.is_some()
                && s.course_id.as_deref() != editing_course
        })
    }

    /// Save-time completeness rule: any slot with a course must also have a
    /// teacher. Not enforced during editing.
    pub fn validate_complete(&self) -> Result<(), TimetableError> {
        for slot in &self.slots {
            if slot.course_id.is_some() && slot.teacher_id.is_none() {
                return Err(TimetableError::Validation(format!(
                    "slot (day {}, period {}) has a course but no assigned teacher",
                    slot.day, slot.period
                )));
            }
        }
        Ok(())
    }

    fn slot_record(&self, slot: &TimetableSlot) -> Record {
        let value = json!({
            "id": Uuid::new_v4().to_string(),
            "classId": self.class_id,
            "academicYear": self.academic_year,
            "day": slot.day,
            "period": slot.period,
            "courseId": slot.course_id,
            "teacherId": slot.teacher_id,
            "room": slot.room,
            "isLab": slot.is_lab,
            "isLabContinuation": slot.is_lab_continuation,
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }
}

fn str_field(record: &Record, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

fn u8_field(record: &Record, key: &str) -> Option<u8> {
    record.get(key).and_then(Value::as_u64).and_then(|v| u8::try_from(v).ok())
}

fn bool_field(record: &Record, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Hydrates the grid from persisted slot rows. Rows for other cohorts or
/// years are ignored; rows with out-of-range coordinates are dropped.
pub fn load_grid(
    store: &dyn CollectionStore,
    class_id: &str,
    academic_year: &str,
) -> Result<TimetableGrid, TimetableError> {
    let rows = store.select_all(TIMETABLE_COLLECTION)?;
    let mut grid = TimetableGrid::new(class_id, academic_year);
    for row in &rows {
        if str_field(row, "classId").as_deref() != Some(class_id)
            || str_field(row, "academicYear").as_deref() != Some(academic_year)
        {
            continue;
        }
        let (Some(day), Some(period)) = (u8_field(row, "day"), u8_field(row, "period")) else {
            continue;
        };
        if check_coords(day, period).is_err() {
            continue;
        }
        grid.slots[index(day, period)] = TimetableSlot {
            day,
            period,
            course_id: str_field(row, "courseId"),
            teacher_id: str_field(row, "teacherId"),
            room: str_field(row, "room"),
            is_lab: bool_field(row, "isLab"),
            is_lab_continuation: bool_field(row, "isLabContinuation"),
        };
    }
    Ok(grid)
}

/// Persists the grid as a full replace for its (class, year): prior rows
/// deleted, occupied slots reinserted, all in one transaction. Last write
/// wins across concurrent editors. Returns the number of rows written.
pub fn save_grid(
    store: &dyn CollectionStore,
    grid: &TimetableGrid,
) -> Result<usize, TimetableError> {
    grid.validate_complete()?;
    let records: Vec<Record> = grid
        .occupied_slots()
        .map(|slot| grid.slot_record(slot))
        .collect();
    store.replace_where(
        TIMETABLE_COLLECTION,
        &[
            ("classId", grid.class_id.as_str()),
            ("academicYear", grid.academic_year.as_str()),
        ],
        &records,
    )?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(course: &str, teacher: Option<&str>) -> SlotAssignment {
        SlotAssignment {
            course_id: course.to_string(),
            teacher_id: teacher.map(str::to_string),
            room: None,
            is_lab: false,
            double_period: false,
        }
    }

    fn lab(course: &str, teacher: &str, room: &str, double: bool) -> SlotAssignment {
        SlotAssignment {
            course_id: course.to_string(),
            teacher_id: Some(teacher.to_string()),
            room: Some(room.to_string()),
            is_lab: true,
            double_period: double,
        }
    }

    #[test]
    fn new_grid_is_25_empty_slots() {
        let grid = TimetableGrid::new("cs-1", "2026-27");
        assert_eq!(grid.slots().len(), 25);
        assert!(grid.slots().iter().all(TimetableSlot::is_empty));
        assert_eq!(grid.get_slot(3, 4).expect("slot").day, 3);
        assert!(grid.get_slot(6, 1).is_err());
        assert!(grid.get_slot(1, 0).is_err());
    }

    #[test]
    fn teacher_clash_self_exclusion() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(1, 2, assignment("math", Some("T1")))
            .expect("set");

        // Different course, same teacher, same time: clash.
        assert!(grid.has_teacher_clash(1, 2, "T1", Some("physics")));
        // Different period: free.
        assert!(!grid.has_teacher_clash(1, 3, "T1", Some("physics")));
        // The very same slot being re-edited: no clash.
        assert!(!grid.has_teacher_clash(1, 2, "T1", Some("math")));
        // Empty slots never clash.
        assert!(!grid.has_teacher_clash(2, 2, "T1", None));
    }

    #[test]
    fn room_clash_only_considers_labs() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(2, 1, lab("chem-lab", "T2", "LAB-A", false))
            .expect("set");
        let mut theory = assignment("history", Some("T3"));
        theory.room = Some("LAB-B".to_string());
        grid.set_slot(2, 2, theory).expect("set");

        assert!(grid.has_room_clash(2, 1, "LAB-A", Some("bio-lab")));
        assert!(!grid.has_room_clash(2, 1, "LAB-A", Some("chem-lab")));
        // Theory slot's room does not participate.
        assert!(!grid.has_room_clash(2, 2, "LAB-B", Some("bio-lab")));
    }

    #[test]
    fn double_lab_rejected_in_last_period() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        let err = grid
            .set_slot(2, 5, lab("chem-lab", "T2", "LAB-A", true))
            .expect_err("must reject");
        match err {
            TimetableError::Validation(msg) => {
                assert!(msg.contains("two-period lab"), "{}", msg)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(grid.get_slot(2, 5).expect("slot").is_empty());
    }

    #[test]
    fn double_lab_writes_mirrored_continuation() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(2, 4, lab("chem-lab", "T2", "LAB-A", true))
            .expect("set");

        let first = grid.get_slot(2, 4).expect("slot").clone();
        let second = grid.get_slot(2, 5).expect("slot").clone();
        assert!(!first.is_lab_continuation);
        assert!(second.is_lab_continuation);
        assert_eq!(second.course_id.as_deref(), Some("chem-lab"));
        assert_eq!(second.teacher_id.as_deref(), Some("T2"));
        assert_eq!(second.room.as_deref(), Some("LAB-A"));
        assert!(second.is_lab);
    }

    #[test]
    fn double_period_requires_lab() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        let mut a = assignment("math", Some("T1"));
        a.double_period = true;
        assert!(grid.set_slot(1, 1, a).is_err());
    }

    #[test]
    fn clearing_either_half_of_a_lab_clears_both() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(3, 2, lab("bio-lab", "T4", "LAB-B", true))
            .expect("set");
        grid.clear_slot(3, 2).expect("clear start");
        assert!(grid.get_slot(3, 2).expect("slot").is_empty());
        assert!(grid.get_slot(3, 3).expect("slot").is_empty());

        grid.set_slot(3, 2, lab("bio-lab", "T4", "LAB-B", true))
            .expect("set");
        grid.clear_slot(3, 3).expect("clear continuation");
        assert!(grid.get_slot(3, 2).expect("slot").is_empty());
        assert!(grid.get_slot(3, 3).expect("slot").is_empty());
    }

    #[test]
    fn overwriting_half_of_a_lab_detaches_the_other_half() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(1, 1, lab("chem-lab", "T2", "LAB-A", true))
            .expect("set");

        // Replacing the lab start with a plain lecture must not leave a
        // dangling continuation behind.
        grid.set_slot(1, 1, assignment("math", Some("T1"))).expect("replace");
        assert!(grid.get_slot(1, 2).expect("slot").is_empty());
        assert_eq!(
            grid.get_slot(1, 1).expect("slot").course_id.as_deref(),
            Some("math")
        );

        // Replacing the continuation clears the stranded lab start.
        grid.set_slot(1, 1, lab("chem-lab", "T2", "LAB-A", true))
            .expect("set");
        grid.set_slot(1, 2, assignment("physics", Some("T3")))
            .expect("replace continuation");
        assert!(grid.get_slot(1, 1).expect("slot").is_empty());
        assert_eq!(
            grid.get_slot(1, 2).expect("slot").course_id.as_deref(),
            Some("physics")
        );
        assert!(!grid.get_slot(1, 2).expect("slot").is_lab_continuation);
    }

    #[test]
    fn double_lab_overwriting_another_lab_start_clears_its_continuation() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(1, 2, lab("bio-lab", "T4", "LAB-B", true))
            .expect("set");

        // The new pair occupies (1,1)-(1,2); the old pair's continuation at
        // (1,3) must go with its overwritten start.
        grid.set_slot(1, 1, lab("chem-lab", "T2", "LAB-A", true))
            .expect("overwrite");
        assert_eq!(
            grid.get_slot(1, 2).expect("slot").course_id.as_deref(),
            Some("chem-lab")
        );
        assert!(grid.get_slot(1, 2).expect("slot").is_lab_continuation);
        assert!(grid.get_slot(1, 3).expect("slot").is_empty());
    }

    #[test]
    fn clearing_does_not_touch_unrelated_neighbours() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(4, 1, assignment("math", Some("T1"))).expect("set");
        grid.set_slot(4, 2, assignment("physics", Some("T2"))).expect("set");
        grid.clear_slot(4, 1).expect("clear");
        assert!(grid.get_slot(4, 1).expect("slot").is_empty());
        assert_eq!(
            grid.get_slot(4, 2).expect("slot").course_id.as_deref(),
            Some("physics")
        );
    }

    #[test]
    fn completeness_requires_teacher_for_every_course() {
        let mut grid = TimetableGrid::new("cs-1", "2026-27");
        grid.set_slot(1, 1, assignment("math", None)).expect("set");
        let err = grid.validate_complete().expect_err("must fail");
        match err {
            TimetableError::Validation(msg) => {
                assert!(msg.contains("day 1"), "{}", msg);
                assert!(msg.contains("period 1"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        grid.set_slot(1, 1, assignment("math", Some("T1"))).expect("set");
        grid.validate_complete().expect("complete");
    }
}
