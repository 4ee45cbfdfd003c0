//! Request and response bodies for the academic API.

use crate::models::timetable::clock_time;
use crate::models::{
    AttendanceRecord, AttendanceStatus, DayOfWeek, ExamType, GradedMark, NewAttendanceRecord,
    NewMark, NewSubject, NewTimetableEntry, TimetableEntry, TimetableFilter,
};
use crate::services::ConflictReport;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, max = 30))]
    pub credits: i32,
    #[validate(range(min = 1, max = 12))]
    pub semester: i32,
    #[validate(range(min = 2000, max = 2100))]
    pub year: Option<i32>,
}

impl From<CreateSubjectRequest> for NewSubject {
    fn from(req: CreateSubjectRequest) -> Self {
        Self {
            code: req.code.trim().to_uppercase(),
            name: req.name,
            credits: req.credits,
            semester: req.semester,
            year: req.year,
        }
    }
}

/// Body of `POST /api/timetable` and `POST /api/timetable/check`.
/// Times are `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTimetableEntryRequest {
    pub subject_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub faculty_id: String,
    #[validate(length(max = 64))]
    pub room_id: Option<String>,
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    #[validate(range(min = 1, max = 12))]
    pub semester: i32,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(length(max = 64))]
    pub batch: Option<String>,
}

impl CreateTimetableEntryRequest {
    /// Fails with `BadRequest` unless `start_time < end_time`.
    pub fn into_new_entry(self) -> Result<NewTimetableEntry, AppError> {
        NewTimetableEntry::new(
            self.subject_id,
            self.faculty_id,
            self.room_id,
            self.day_of_week,
            self.start_time,
            self.end_time,
            self.semester,
            self.year,
            self.batch,
        )
    }
}

/// `GET /api/timetable` query. `subject_ids` is a comma separated list,
/// typically a student's enrolled subjects.
#[derive(Debug, Default, Deserialize)]
pub struct TimetableQuery {
    pub semester: Option<i32>,
    pub year: Option<i32>,
    pub faculty_id: Option<String>,
    pub subject_ids: Option<String>,
}

impl TimetableQuery {
    pub fn into_filter(self) -> Result<TimetableFilter, AppError> {
        let subject_ids = self
            .subject_ids
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        Uuid::parse_str(s).map_err(|_| {
                            AppError::BadRequest(anyhow::anyhow!("Invalid subject id '{}'", s))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(TimetableFilter {
            semester: self.semester,
            year: self.year,
            faculty_id: self.faculty_id,
            subject_ids,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflicts: bool,
    pub faculty_conflicts: Vec<TimetableEntry>,
    pub room_conflicts: Vec<TimetableEntry>,
}

impl From<ConflictReport> for ConflictCheckResponse {
    fn from(report: ConflictReport) -> Self {
        Self {
            has_conflicts: report.has_conflicts(),
            faculty_conflicts: report.faculty,
            room_conflicts: report.room,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMarkRequest {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    pub subject_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub faculty_id: String,
    pub exam_type: ExamType,
    #[validate(range(min = 0.0))]
    pub max_marks: f64,
    #[validate(range(min = 0.0))]
    pub obtained_marks: f64,
    #[validate(range(min = 1, max = 12))]
    pub semester: i32,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
}

impl From<CreateMarkRequest> for NewMark {
    fn from(req: CreateMarkRequest) -> Self {
        Self {
            student_id: req.student_id,
            subject_id: req.subject_id,
            faculty_id: req.faculty_id,
            exam_type: req.exam_type,
            max_marks: req.max_marks,
            obtained_marks: req.obtained_marks,
            semester: req.semester,
            year: req.year,
        }
    }
}

/// Rows are validated and stored one by one.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchMarksRequest {
    #[validate(length(min = 1))]
    pub marks: Vec<CreateMarkRequest>,
}

#[derive(Debug, Serialize)]
pub struct MarkResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<GradedMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchMarksResponse {
    pub recorded: usize,
    pub failed: usize,
    pub results: Vec<MarkResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AttendanceEntry {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// One class session: every listed student gets a row for `date`.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordAttendanceRequest {
    pub subject_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub faculty_id: String,
    pub date: NaiveDate,
    #[validate(length(min = 1), nested)]
    pub entries: Vec<AttendanceEntry>,
}

impl RecordAttendanceRequest {
    pub fn records(&self) -> Vec<NewAttendanceRecord> {
        self.entries
            .iter()
            .map(|entry| NewAttendanceRecord {
                student_id: entry.student_id.clone(),
                subject_id: self.subject_id,
                faculty_id: self.faculty_id.clone(),
                date: self.date,
                status: entry.status,
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceRecordedResponse {
    pub recorded: usize,
    pub records: Vec<AttendanceRecord>,
}
