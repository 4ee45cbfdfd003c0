//! Faculty and room double-booking detection.
//!
//! A faculty member clashes with entries on the same day in the same
//! semester and year. A room clashes with entries on the same day in any
//! term. Both use the half-open overlap of
//! [`crate::models::TimeRange::overlaps`].

use crate::models::{NewTimetableEntry, TimetableEntry};
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConflictReport {
    pub faculty: Vec<TimetableEntry>,
    pub room: Vec<TimetableEntry>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.faculty.is_empty() || !self.room.is_empty()
    }

    /// Union of both lists; an entry clashing on both axes appears once.
    pub fn conflicting_entries(&self) -> Vec<&TimetableEntry> {
        let mut seen = HashSet::new();
        self.faculty
            .iter()
            .chain(self.room.iter())
            .filter(|entry| seen.insert(entry.id))
            .collect()
    }

    pub fn into_error(self) -> AppError {
        let details = serde_json::json!({
            "conflicts": self.conflicting_entries(),
            "faculty_conflicts": self.faculty.len(),
            "room_conflicts": self.room.len(),
        });
        AppError::ScheduleConflict(details)
    }
}

pub struct ConflictChecker;

impl ConflictChecker {
    pub fn faculty_clash(proposed: &NewTimetableEntry, existing: &TimetableEntry) -> bool {
        existing.faculty_id == proposed.faculty_id
            && existing.semester == proposed.semester
            && existing.year == proposed.year
            && existing.time_range().overlaps(&proposed.range)
    }

    /// Never true for a proposal without a room.
    pub fn room_clash(proposed: &NewTimetableEntry, existing: &TimetableEntry) -> bool {
        match (&proposed.room_id, &existing.room_id) {
            (Some(proposed_room), Some(existing_room)) => {
                proposed_room == existing_room && existing.time_range().overlaps(&proposed.range)
            }
            _ => false,
        }
    }

    pub fn check<'a>(
        proposed: &NewTimetableEntry,
        existing: impl IntoIterator<Item = &'a TimetableEntry>,
    ) -> ConflictReport {
        let mut report = ConflictReport::default();
        for entry in existing {
            if Self::faculty_clash(proposed, entry) {
                report.faculty.push(entry.clone());
            }
            if Self::room_clash(proposed, entry) {
                report.room.push(entry.clone());
            }
        }
        report
    }
}
