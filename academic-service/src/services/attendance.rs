//! Attendance percentages and the attendance requirement.

use crate::models::{AttendanceRecord, Subject};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Minimum attendance, inclusive.
pub const REQUIRED_ATTENDANCE_PERCENT: f64 = 75.0;

/// `attended / total * 100`; no classes yields 0.
pub fn attendance_percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(attended) * 100.0 / f64::from(total)
}

pub fn meets_requirement(percentage: f64) -> bool {
    percentage >= REQUIRED_ATTENDANCE_PERCENT
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct AttendanceTally {
    pub total_classes: u32,
    pub attended_classes: u32,
    pub percentage: f64,
    pub requirement_met: bool,
}

impl AttendanceTally {
    fn from_counts(attended: u32, total: u32) -> Self {
        let percentage = attendance_percentage(attended, total);
        Self {
            total_classes: total,
            attended_classes: attended,
            percentage,
            requirement_met: meets_requirement(percentage),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectAttendance {
    pub subject_id: Uuid,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    #[serde(flatten)]
    pub tally: AttendanceTally,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSummary {
    pub student_id: String,
    pub required_percentage: f64,
    pub overall: AttendanceTally,
    pub subjects: Vec<SubjectAttendance>,
}

pub fn summarize(
    student_id: &str,
    records: &[AttendanceRecord],
    subjects: &HashMap<Uuid, Subject>,
) -> AttendanceSummary {
    let mut per_subject: BTreeMap<Uuid, (u32, u32)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.student_id == student_id) {
        let counts = per_subject.entry(record.subject_id).or_insert((0, 0));
        if record.status.is_attended() {
            counts.0 += 1;
        }
        counts.1 += 1;
    }

    let (attended, total) = per_subject
        .values()
        .fold((0, 0), |(a, t), (attended, total)| (a + attended, t + total));

    let mut subject_rows: Vec<SubjectAttendance> = per_subject
        .into_iter()
        .map(|(subject_id, (attended, total))| {
            let subject = subjects.get(&subject_id);
            SubjectAttendance {
                subject_id,
                subject_code: subject.map(|s| s.code.clone()),
                subject_name: subject.map(|s| s.name.clone()),
                tally: AttendanceTally::from_counts(attended, total),
            }
        })
        .collect();
    subject_rows.sort_by(|a, b| a.subject_code.cmp(&b.subject_code));

    AttendanceSummary {
        student_id: student_id.to_string(),
        required_percentage: REQUIRED_ATTENDANCE_PERCENT,
        overall: AttendanceTally::from_counts(attended, total),
        subjects: subject_rows,
    }
}
