//! Domain models for academic-service.

pub mod attendance;
pub mod grade;
pub mod mark;
pub mod subject;
pub mod timetable;

pub use attendance::{AttendanceRecord, AttendanceStatus, NewAttendanceRecord};
pub use grade::Grade;
pub use mark::{ExamType, GradedMark, Mark, MarkFilter, NewMark};
pub use subject::{NewSubject, Subject};
pub use timetable::{DayOfWeek, NewTimetableEntry, TimeRange, TimetableEntry, TimetableFilter};
