pub mod backup;
pub mod collections;
pub mod core;
pub mod timetable;
