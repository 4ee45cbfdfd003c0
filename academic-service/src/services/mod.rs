pub mod attendance;
pub mod conflict;
pub mod database;
pub mod grading;
pub mod metrics;
pub mod store;
pub mod timetable;

pub use conflict::{ConflictChecker, ConflictReport};
pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use store::{AcademicStore, InMemoryAcademicStore, ScheduleOutcome};
pub use timetable::Scheduler;
