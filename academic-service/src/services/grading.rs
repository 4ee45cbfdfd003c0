//! Percentages, letter grades and credit-weighted GPA.
//!
//! Banding uses inclusive lower bounds: `>=90 A+`, `>=80 A`, `>=70 B`,
//! `>=60 C`, `>=50 D`, else `F`. Grade points are on a 10-point scale:
//! `>=90 10`, `>=80 9`, `>=70 8`, `>=60 7`, `>=50 6`, `>=40 5`, else `0`.

use crate::models::{Grade, GradedMark, Mark, Subject};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// `obtained / max * 100`; a zero maximum yields 0.
pub fn percentage(obtained: f64, max: f64) -> f64 {
    if max == 0.0 {
        return 0.0;
    }
    obtained * 100.0 / max
}

pub fn grade_for(percentage: f64) -> Grade {
    match percentage {
        p if p >= 90.0 => Grade::APlus,
        p if p >= 80.0 => Grade::A,
        p if p >= 70.0 => Grade::B,
        p if p >= 60.0 => Grade::C,
        p if p >= 50.0 => Grade::D,
        _ => Grade::F,
    }
}

pub fn grade_points(percentage: f64) -> u8 {
    match percentage {
        p if p >= 90.0 => 10,
        p if p >= 80.0 => 9,
        p if p >= 70.0 => 8,
        p if p >= 60.0 => 7,
        p if p >= 50.0 => 6,
        p if p >= 40.0 => 5,
        _ => 0,
    }
}

pub fn grade_mark(mark: Mark) -> GradedMark {
    let percentage = percentage(mark.obtained_marks, mark.max_marks);
    GradedMark {
        mark,
        percentage,
        grade: grade_for(percentage),
    }
}

/// Aggregate result of one subject within one semester.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubjectResult {
    pub subject_id: Uuid,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: i32,
    pub obtained_marks: f64,
    pub max_marks: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub grade_points: u8,
}

impl SubjectResult {
    fn new(subject: &Subject, obtained_marks: f64, max_marks: f64) -> Self {
        let percentage = percentage(obtained_marks, max_marks);
        Self {
            subject_id: subject.id,
            subject_code: subject.code.clone(),
            subject_name: subject.name.clone(),
            credits: subject.credits,
            obtained_marks,
            max_marks,
            percentage,
            grade: grade_for(percentage),
            grade_points: grade_points(percentage),
        }
    }
}

/// `Σ(grade_points × credits) / Σ credits` over `(grade_points, credits)`
/// pairs, one per mark; 0 when there is nothing to weigh.
pub fn gpa(weighted_marks: impl IntoIterator<Item = (u8, i32)>) -> f64 {
    let (weighted, credits) = weighted_marks
        .into_iter()
        .filter(|(_, credits)| *credits > 0)
        .fold((0.0, 0i64), |(weighted, total), (points, credits)| {
            (
                weighted + f64::from(points) * f64::from(credits),
                total + i64::from(credits),
            )
        });

    if credits == 0 {
        0.0
    } else {
        weighted / credits as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SemesterResult {
    pub year: i32,
    pub semester: i32,
    pub subjects: Vec<SubjectResult>,
    pub credits: i32,
    pub gpa: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub student_id: String,
    pub semesters: Vec<SemesterResult>,
    pub total_credits: i32,
    pub overall_gpa: f64,
}

/// Group a student's marks by `(year, semester)` and subject. Every mark
/// contributes its own grade points, weighted by its subject's credits.
/// The per-subject percentage is summed obtained over summed maximum.
pub fn transcript(student_id: &str, marks: &[Mark], subjects: &HashMap<Uuid, Subject>) -> Transcript {
    let mut grouped: BTreeMap<(i32, i32), BTreeMap<Uuid, Vec<&Mark>>> = BTreeMap::new();

    for mark in marks.iter().filter(|m| m.student_id == student_id) {
        if !subjects.contains_key(&mark.subject_id) {
            tracing::warn!(mark_id = %mark.id, subject_id = %mark.subject_id, "Mark references unknown subject");
            continue;
        }
        grouped
            .entry((mark.year, mark.semester))
            .or_default()
            .entry(mark.subject_id)
            .or_default()
            .push(mark);
    }

    let mut all_weighted = Vec::new();
    let semesters: Vec<SemesterResult> = grouped
        .into_iter()
        .map(|((year, semester), by_subject)| {
            let mut results = Vec::with_capacity(by_subject.len());
            let mut weighted = Vec::new();

            for (subject_id, subject_marks) in by_subject {
                let Some(subject) = subjects.get(&subject_id) else {
                    continue;
                };
                let (obtained, max) = subject_marks
                    .iter()
                    .fold((0.0, 0.0), |(o, m), mark| (o + mark.obtained_marks, m + mark.max_marks));
                weighted.extend(subject_marks.iter().map(|mark| {
                    (
                        grade_points(percentage(mark.obtained_marks, mark.max_marks)),
                        subject.credits,
                    )
                }));
                results.push(SubjectResult::new(subject, obtained, max));
            }
            results.sort_by(|a, b| a.subject_code.cmp(&b.subject_code));

            let gpa = gpa(weighted.iter().copied());
            all_weighted.extend(weighted);

            SemesterResult {
                year,
                semester,
                credits: results.iter().map(|r| r.credits).sum(),
                gpa,
                subjects: results,
            }
        })
        .collect();

    Transcript {
        student_id: student_id.to_string(),
        total_credits: semesters.iter().map(|s| s.credits).sum(),
        overall_gpa: gpa(all_weighted),
        semesters,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubjectPerformance {
    pub subject_id: Uuid,
    pub subject_code: String,
    pub subject_name: String,
    pub average_score: f64,
    pub total_assessments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub total_assessments: usize,
    pub grade_distribution: Vec<GradeCount>,
    pub subject_performance: Vec<SubjectPerformance>,
}

/// Count of marks per letter grade, best grade first, every grade listed.
pub fn grade_distribution(marks: &[Mark]) -> Vec<GradeCount> {
    let mut counts: HashMap<Grade, usize> = HashMap::new();
    for mark in marks {
        *counts
            .entry(grade_for(percentage(mark.obtained_marks, mark.max_marks)))
            .or_default() += 1;
    }

    Grade::ALL
        .iter()
        .map(|grade| GradeCount {
            grade: *grade,
            count: counts.get(grade).copied().unwrap_or(0),
        })
        .collect()
}

/// Mean per-assessment percentage for each subject, highest first.
pub fn subject_performance(
    marks: &[Mark],
    subjects: &HashMap<Uuid, Subject>,
) -> Vec<SubjectPerformance> {
    let mut totals: HashMap<Uuid, (f64, usize)> = HashMap::new();
    for mark in marks {
        let entry = totals.entry(mark.subject_id).or_insert((0.0, 0));
        entry.0 += percentage(mark.obtained_marks, mark.max_marks);
        entry.1 += 1;
    }

    let mut performance: Vec<SubjectPerformance> = totals
        .into_iter()
        .filter_map(|(subject_id, (sum, count))| {
            subjects.get(&subject_id).map(|subject| SubjectPerformance {
                subject_id,
                subject_code: subject.code.clone(),
                subject_name: subject.name.clone(),
                average_score: sum / count as f64,
                total_assessments: count,
            })
        })
        .collect();

    performance.sort_by(|a, b| {
        b.average_score
            .total_cmp(&a.average_score)
            .then_with(|| a.subject_code.cmp(&b.subject_code))
    });
    performance
}

pub fn performance_report(marks: &[Mark], subjects: &HashMap<Uuid, Subject>) -> PerformanceReport {
    PerformanceReport {
        total_assessments: marks.len(),
        grade_distribution: grade_distribution(marks),
        subject_performance: subject_performance(marks, subjects),
    }
}
