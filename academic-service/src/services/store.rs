//! Persistence seam for academic-service.
//!
//! [`AcademicStore`] is implemented by the PostgreSQL [`Database`] and by
//! [`InMemoryAcademicStore`], which backs the HTTP tests.
//!
//! [`Database`]: crate::services::database::Database

use crate::models::{
    AttendanceRecord, Mark, MarkFilter, NewAttendanceRecord, NewMark, NewSubject,
    NewTimetableEntry, Subject, TimetableEntry, TimetableFilter,
};
use crate::services::conflict::{ConflictChecker, ConflictReport};
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Result of an atomic check-and-insert.
#[derive(Debug, Clone)]
pub enum ScheduleOutcome {
    Created(TimetableEntry),
    Conflict(ConflictReport),
}

#[async_trait]
pub trait AcademicStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Fails with `Conflict` when the code is taken.
    async fn insert_subject(&self, subject: &NewSubject) -> Result<Subject, AppError>;

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, AppError>;

    /// All subjects ordered by code.
    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError>;

    /// Read-only conflict report for a proposed entry.
    async fn find_conflicts(&self, proposed: &NewTimetableEntry)
        -> Result<ConflictReport, AppError>;

    /// Check for conflicts and insert in one unit; nothing is written on
    /// conflict.
    async fn create_timetable_entry(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ScheduleOutcome, AppError>;

    /// Matching entries ordered by day, then start time.
    async fn list_timetable(
        &self,
        filter: &TimetableFilter,
    ) -> Result<Vec<TimetableEntry>, AppError>;

    /// Whether an entry was removed.
    async fn delete_timetable_entry(&self, id: Uuid) -> Result<bool, AppError>;

    async fn insert_mark(&self, mark: &NewMark) -> Result<Mark, AppError>;

    /// Matching marks, newest first.
    async fn list_marks(&self, filter: &MarkFilter) -> Result<Vec<Mark>, AppError>;

    /// Upsert on `(student_id, subject_id, date)`; all rows or none.
    async fn record_attendance(
        &self,
        records: &[NewAttendanceRecord],
    ) -> Result<Vec<AttendanceRecord>, AppError>;

    /// A student's attendance, newest date first.
    async fn list_attendance(&self, student_id: &str) -> Result<Vec<AttendanceRecord>, AppError>;
}

#[derive(Default)]
struct MemoryState {
    subjects: Vec<Subject>,
    timetable: Vec<TimetableEntry>,
    marks: Vec<Mark>,
    attendance: Vec<AttendanceRecord>,
}

/// Process-local store with the same rules as PostgreSQL.
#[derive(Default)]
pub struct InMemoryAcademicStore {
    state: Mutex<MemoryState>,
}

impl InMemoryAcademicStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl AcademicStore for InMemoryAcademicStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.state().map(|_| ())
    }

    async fn insert_subject(&self, subject: &NewSubject) -> Result<Subject, AppError> {
        let mut state = self.state()?;
        if state.subjects.iter().any(|s| s.code == subject.code) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Subject code '{}' already exists",
                subject.code
            )));
        }

        let record = Subject {
            id: Uuid::new_v4(),
            code: subject.code.clone(),
            name: subject.name.clone(),
            credits: subject.credits,
            semester: subject.semester,
            year: subject.year,
            created_at: Utc::now(),
        };
        state.subjects.push(record.clone());
        Ok(record)
    }

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, AppError> {
        Ok(self.state()?.subjects.iter().find(|s| s.id == id).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let mut subjects = self.state()?.subjects.clone();
        subjects.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(subjects)
    }

    async fn find_conflicts(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ConflictReport, AppError> {
        Ok(ConflictChecker::check(proposed, &self.state()?.timetable))
    }

    async fn create_timetable_entry(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ScheduleOutcome, AppError> {
        let mut state = self.state()?;

        let report = ConflictChecker::check(proposed, &state.timetable);
        if report.has_conflicts() {
            return Ok(ScheduleOutcome::Conflict(report));
        }

        let entry = proposed.clone().into_entry(Uuid::new_v4(), Utc::now());
        state.timetable.push(entry.clone());
        Ok(ScheduleOutcome::Created(entry))
    }

    async fn list_timetable(
        &self,
        filter: &TimetableFilter,
    ) -> Result<Vec<TimetableEntry>, AppError> {
        let mut entries: Vec<TimetableEntry> = self
            .state()?
            .timetable
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.day_of_week
                .cmp(&b.day_of_week)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        Ok(entries)
    }

    async fn delete_timetable_entry(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state()?;
        let before = state.timetable.len();
        state.timetable.retain(|e| e.id != id);
        Ok(state.timetable.len() != before)
    }

    async fn insert_mark(&self, mark: &NewMark) -> Result<Mark, AppError> {
        mark.check_bounds()?;

        let record = Mark {
            id: Uuid::new_v4(),
            student_id: mark.student_id.clone(),
            subject_id: mark.subject_id,
            faculty_id: mark.faculty_id.clone(),
            exam_type: mark.exam_type,
            max_marks: mark.max_marks,
            obtained_marks: mark.obtained_marks,
            semester: mark.semester,
            year: mark.year,
            created_at: Utc::now(),
        };
        self.state()?.marks.push(record.clone());
        Ok(record)
    }

    async fn list_marks(&self, filter: &MarkFilter) -> Result<Vec<Mark>, AppError> {
        let mut marks: Vec<Mark> = self
            .state()?
            .marks
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        marks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(marks)
    }

    async fn record_attendance(
        &self,
        records: &[NewAttendanceRecord],
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut state = self.state()?;
        let mut saved = Vec::with_capacity(records.len());

        for record in records {
            let existing = state.attendance.iter_mut().find(|a| {
                a.student_id == record.student_id
                    && a.subject_id == record.subject_id
                    && a.date == record.date
            });

            let stored = match existing {
                Some(row) => {
                    row.status = record.status;
                    row.faculty_id = record.faculty_id.clone();
                    row.clone()
                }
                None => {
                    let row = AttendanceRecord {
                        id: Uuid::new_v4(),
                        student_id: record.student_id.clone(),
                        subject_id: record.subject_id,
                        faculty_id: record.faculty_id.clone(),
                        date: record.date,
                        status: record.status,
                        created_at: Utc::now(),
                    };
                    state.attendance.push(row.clone());
                    row
                }
            };
            saved.push(stored);
        }

        Ok(saved)
    }

    async fn list_attendance(&self, student_id: &str) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut records: Vec<AttendanceRecord> = self
            .state()?
            .attendance
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, DayOfWeek, ExamType};
    use chrono::{NaiveDate, NaiveTime};

    fn t(hhmm: &str) -> NaiveTime {
        NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap()
    }

    fn slot(faculty: &str, day: DayOfWeek, start: &str, end: &str) -> NewTimetableEntry {
        NewTimetableEntry::new(
            Uuid::new_v4(),
            faculty,
            None,
            day,
            t(start),
            t(end),
            3,
            2024,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_conflicting_entry_not_inserted() {
        let store = InMemoryAcademicStore::new();

        let first = store
            .create_timetable_entry(&slot("F1", DayOfWeek::Monday, "09:00", "10:00"))
            .await
            .unwrap();
        assert!(matches!(first, ScheduleOutcome::Created(_)));

        let second = store
            .create_timetable_entry(&slot("F1", DayOfWeek::Monday, "09:30", "10:30"))
            .await
            .unwrap();
        match second {
            ScheduleOutcome::Conflict(report) => assert_eq!(report.faculty.len(), 1),
            ScheduleOutcome::Created(_) => panic!("overlapping entry was created"),
        }

        let all = store
            .list_timetable(&TimetableFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_timetable_ordered_by_day_then_start() {
        let store = InMemoryAcademicStore::new();
        for (day, start, end) in [
            (DayOfWeek::Wednesday, "09:00", "10:00"),
            (DayOfWeek::Monday, "11:00", "12:00"),
            (DayOfWeek::Monday, "08:00", "09:00"),
        ] {
            store
                .create_timetable_entry(&slot("F1", day, start, end))
                .await
                .unwrap();
        }

        let entries = store
            .list_timetable(&TimetableFilter::default())
            .await
            .unwrap();
        let order: Vec<(DayOfWeek, NaiveTime)> = entries
            .iter()
            .map(|e| (e.day_of_week, e.start_time))
            .collect();
        assert_eq!(
            order,
            vec![
                (DayOfWeek::Monday, t("08:00")),
                (DayOfWeek::Monday, t("11:00")),
                (DayOfWeek::Wednesday, t("09:00")),
            ]
        );
    }

    #[tokio::test]
    async fn test_subject_filter_with_empty_list_matches_nothing() {
        let store = InMemoryAcademicStore::new();
        store
            .create_timetable_entry(&slot("F1", DayOfWeek::Monday, "09:00", "10:00"))
            .await
            .unwrap();

        let filter = TimetableFilter {
            subject_ids: Some(vec![]),
            ..Default::default()
        };
        assert!(store.list_timetable(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_subject_code_rejected() {
        let store = InMemoryAcademicStore::new();
        let subject = NewSubject {
            code: "MA101".to_string(),
            name: "Calculus".to_string(),
            credits: 4,
            semester: 1,
            year: None,
        };
        store.insert_subject(&subject).await.unwrap();
        let err = store.insert_subject(&subject).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_mark_bounds_enforced() {
        let store = InMemoryAcademicStore::new();
        let mark = NewMark {
            student_id: "S1".to_string(),
            subject_id: Uuid::new_v4(),
            faculty_id: "F1".to_string(),
            exam_type: ExamType::Quiz,
            max_marks: 10.0,
            obtained_marks: 11.0,
            semester: 3,
            year: 2024,
        };
        assert!(store.insert_mark(&mark).await.is_err());
        assert!(store
            .list_marks(&MarkFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_attendance_upserts_per_day() {
        let store = InMemoryAcademicStore::new();
        let subject_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let row = |status| NewAttendanceRecord {
            student_id: "S1".to_string(),
            subject_id,
            faculty_id: "F1".to_string(),
            date,
            status,
        };

        store
            .record_attendance(&[row(AttendanceStatus::Absent)])
            .await
            .unwrap();
        store
            .record_attendance(&[row(AttendanceStatus::Present)])
            .await
            .unwrap();

        let records = store.list_attendance("S1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Present);
    }
}
