//! Table Registry: the fixed, ordered set of collections that participate in
//! backup and restore.
//!
//! Order matters. Restore replays collections in this order, so collections
//! referenced by later rows (people, catalog entries) come before the rows
//! that reference them (enrollments, marks, transactions). Adding a new
//! collection to the system means appending it here; the schema bootstrap
//! and the snapshot coordinator pick it up from this list.

pub const REGISTERED_COLLECTIONS: [&str; 16] = [
    "departments",
    "programs",
    "teachers",
    "students",
    "courses",
    "enrollments",
    "timetable_slots",
    "attendance_events",
    "exams",
    "exam_marks",
    "assignments",
    "fee_transactions",
    "library_loans",
    "bus_routes",
    "canteen_menu_items",
    "notices",
];

pub fn is_registered(name: &str) -> bool {
    REGISTERED_COLLECTIONS.contains(&name)
}
