//! Timetable scheduling: conflict checks and guarded creation.

use crate::models::{NewTimetableEntry, TimetableEntry};
use crate::services::conflict::ConflictReport;
use crate::services::metrics;
use crate::services::store::{AcademicStore, ScheduleOutcome};
use service_core::error::AppError;
use service_core::utils::KeyedLocks;
use std::sync::Arc;
use tracing::instrument;

/// Creates timetable entries one faculty-day and room-day at a time.
///
/// The keyed locks serialise competing proposals inside this process; the
/// store's check-and-insert unit covers other replicas.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn AcademicStore>,
    locks: KeyedLocks,
}

impl Scheduler {
    pub fn new(store: Arc<dyn AcademicStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    async fn ensure_subject(&self, proposed: &NewTimetableEntry) -> Result<(), AppError> {
        match self.store.get_subject(proposed.subject_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(anyhow::anyhow!(
                "Subject {} not found",
                proposed.subject_id
            ))),
        }
    }

    /// Report what the proposal would clash with, without writing.
    #[instrument(skip(self, proposed), fields(faculty_id = %proposed.faculty_id, day = %proposed.range.day))]
    pub async fn check(&self, proposed: &NewTimetableEntry) -> Result<ConflictReport, AppError> {
        self.store.find_conflicts(proposed).await
    }

    /// Persist the proposal, or fail with `ScheduleConflict` listing every
    /// clashing entry.
    #[instrument(skip(self, proposed), fields(faculty_id = %proposed.faculty_id, day = %proposed.range.day))]
    pub async fn create(&self, proposed: &NewTimetableEntry) -> Result<TimetableEntry, AppError> {
        self.ensure_subject(proposed).await?;

        let _guards = self.locks.lock_many(&proposed.lock_keys()).await;

        match self.store.create_timetable_entry(proposed).await? {
            ScheduleOutcome::Created(entry) => {
                metrics::record_timetable_created();
                tracing::info!(entry_id = %entry.id, "Timetable entry created");
                Ok(entry)
            }
            ScheduleOutcome::Conflict(report) => {
                if !report.faculty.is_empty() {
                    metrics::record_conflict("faculty");
                }
                if !report.room.is_empty() {
                    metrics::record_conflict("room");
                }
                tracing::warn!(
                    faculty_conflicts = report.faculty.len(),
                    room_conflicts = report.room.len(),
                    "Timetable proposal rejected"
                );
                Err(report.into_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayOfWeek, NewSubject};
    use crate::services::store::InMemoryAcademicStore;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn t(hhmm: &str) -> NaiveTime {
        NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap()
    }

    async fn scheduler_with_subject() -> (Scheduler, Uuid) {
        let store = Arc::new(InMemoryAcademicStore::new());
        let subject = store
            .insert_subject(&NewSubject {
                code: "CS301".to_string(),
                name: "Operating Systems".to_string(),
                credits: 4,
                semester: 3,
                year: Some(2024),
            })
            .await
            .unwrap();
        (Scheduler::new(store), subject.id)
    }

    fn proposal(subject_id: Uuid, room: &str, start: &str, end: &str) -> NewTimetableEntry {
        NewTimetableEntry::new(
            subject_id,
            "F1",
            Some(room.to_string()),
            DayOfWeek::Monday,
            t(start),
            t(end),
            3,
            2024,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_subject_is_not_found() {
        let (scheduler, _) = scheduler_with_subject().await;
        let err = scheduler
            .create(&proposal(Uuid::new_v4(), "R1", "09:00", "10:00"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_overlap_rejected_with_conflict() {
        let (scheduler, subject_id) = scheduler_with_subject().await;
        scheduler
            .create(&proposal(subject_id, "R1", "09:00", "10:00"))
            .await
            .unwrap();

        let err = scheduler
            .create(&proposal(subject_id, "R1", "09:30", "10:30"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SCHEDULE_CONFLICT");

        // Same clash on both axes is listed once.
        match err {
            AppError::ScheduleConflict(details) => {
                assert_eq!(details["conflicts"].as_array().unwrap().len(), 1);
                assert_eq!(details["faculty_conflicts"], 1);
                assert_eq!(details["room_conflicts"], 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_proposals_admit_one() {
        let (scheduler, subject_id) = scheduler_with_subject().await;

        let a = {
            let scheduler = scheduler.clone();
            let proposed = proposal(subject_id, "R1", "09:00", "10:00");
            tokio::spawn(async move { scheduler.create(&proposed).await })
        };
        let b = {
            let scheduler = scheduler.clone();
            let proposed = proposal(subject_id, "R2", "09:30", "10:30");
            tokio::spawn(async move { scheduler.create(&proposed).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn test_check_does_not_write() {
        let (scheduler, subject_id) = scheduler_with_subject().await;
        let proposed = proposal(subject_id, "R1", "09:00", "10:00");

        let report = scheduler.check(&proposed).await.unwrap();
        assert!(!report.has_conflicts());

        // The dry run left the slot free.
        scheduler.create(&proposed).await.unwrap();
    }
}
