pub mod catalog;
pub mod db;
pub mod ipc;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod timetable;
