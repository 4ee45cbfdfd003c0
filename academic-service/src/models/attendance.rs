//! Attendance records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "PRESENT",
            Self::Absent => "ABSENT",
            Self::Late => "LATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRESENT" => Some(Self::Present),
            "ABSENT" => Some(Self::Absent),
            "LATE" => Some(Self::Late),
            _ => None,
        }
    }

    /// Only `PRESENT` counts towards the attendance percentage.
    pub fn is_attended(&self) -> bool {
        matches!(self, Self::Present)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub created_at: DateTime<Utc>,
}

/// One row to record; a second row for the same student, subject and date
/// replaces the status of the first.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub student_id: String,
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}
