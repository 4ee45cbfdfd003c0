//! Assessment marks.

use crate::models::Grade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamType {
    Quiz,
    Midterm,
    Final,
    Assignment,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiz => "QUIZ",
            Self::Midterm => "MIDTERM",
            Self::Final => "FINAL",
            Self::Assignment => "ASSIGNMENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUIZ" => Some(Self::Quiz),
            "MIDTERM" => Some(Self::Midterm),
            "FINAL" => Some(Self::Final),
            "ASSIGNMENT" => Some(Self::Assignment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: Uuid,
    pub student_id: String,
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub exam_type: ExamType,
    pub max_marks: f64,
    pub obtained_marks: f64,
    pub semester: i32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMark {
    pub student_id: String,
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub exam_type: ExamType,
    pub max_marks: f64,
    pub obtained_marks: f64,
    pub semester: i32,
    pub year: i32,
}

impl NewMark {
    /// `0 <= obtained_marks <= max_marks`, both finite.
    pub fn check_bounds(&self) -> Result<(), AppError> {
        if !self.max_marks.is_finite() || !self.obtained_marks.is_finite() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Marks must be finite numbers"
            )));
        }
        if self.max_marks < 0.0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "max_marks must not be negative"
            )));
        }
        if self.obtained_marks < 0.0 || self.obtained_marks > self.max_marks {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "obtained_marks {} must be between 0 and max_marks {}",
                self.obtained_marks,
                self.max_marks
            )));
        }
        Ok(())
    }
}

/// A mark with its derived percentage and letter grade.
#[derive(Debug, Clone, Serialize)]
pub struct GradedMark {
    #[serde(flatten)]
    pub mark: Mark,
    pub percentage: f64,
    pub grade: Grade,
}

/// Listing filter; every field set narrows the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkFilter {
    pub student_id: Option<String>,
    pub subject_id: Option<Uuid>,
    pub faculty_id: Option<String>,
    pub exam_type: Option<ExamType>,
    pub semester: Option<i32>,
    pub year: Option<i32>,
}

impl MarkFilter {
    pub fn for_student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, mark: &Mark) -> bool {
        self.student_id.as_ref().map_or(true, |s| &mark.student_id == s)
            && self.subject_id.map_or(true, |s| mark.subject_id == s)
            && self.faculty_id.as_ref().map_or(true, |f| &mark.faculty_id == f)
            && self.exam_type.map_or(true, |e| mark.exam_type == e)
            && self.semester.map_or(true, |s| mark.semester == s)
            && self.year.map_or(true, |y| mark.year == y)
    }
}
