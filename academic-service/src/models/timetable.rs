//! Timetable entries and the time ranges they occupy.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "MONDAY",
            Self::Tuesday => "TUESDAY",
            Self::Wednesday => "WEDNESDAY",
            Self::Thursday => "THURSDAY",
            Self::Friday => "FRIDAY",
            Self::Saturday => "SATURDAY",
        }
    }

    /// ISO day number, Monday = 1. Stored in the `day_of_week` column.
    pub fn number(&self) -> i16 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
        }
    }

    pub fn from_number(number: i16) -> Option<Self> {
        match number {
            1 => Some(Self::Monday),
            2 => Some(Self::Tuesday),
            3 => Some(Self::Wednesday),
            4 => Some(Self::Thursday),
            5 => Some(Self::Friday),
            6 => Some(Self::Saturday),
            _ => None,
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open `[start, end)` slot on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(day: DayOfWeek, start: NaiveTime, end: NaiveTime) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "start_time {} must be before end_time {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { day, start, end })
    }

    /// Ranges overlap when they share an interior point on the same day.
    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.day == other.day && self.start < other.end && self.end > other.start
    }
}

/// `HH:MM` on the wire; `HH:MM:SS` is accepted on input.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|_| de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub room_id: Option<String>,
    pub day_of_week: DayOfWeek,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub semester: i32,
    pub year: i32,
    pub batch: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimetableEntry {
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            day: self.day_of_week,
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// A proposed entry. Construct through [`NewTimetableEntry::new`] so the
/// range is known to be non-empty.
#[derive(Debug, Clone)]
pub struct NewTimetableEntry {
    pub subject_id: Uuid,
    pub faculty_id: String,
    pub room_id: Option<String>,
    pub range: TimeRange,
    pub semester: i32,
    pub year: i32,
    pub batch: Option<String>,
}

impl NewTimetableEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subject_id: Uuid,
        faculty_id: impl Into<String>,
        room_id: Option<String>,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        semester: i32,
        year: i32,
        batch: Option<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            subject_id,
            faculty_id: faculty_id.into(),
            // Blank room ids mean no room.
            room_id: room_id.filter(|r| !r.trim().is_empty()),
            range: TimeRange::new(day, start, end)?,
            semester,
            year,
            batch,
        })
    }

    /// Keys serialising creations that could conflict with this one.
    pub fn lock_keys(&self) -> Vec<String> {
        let mut keys = vec![format!(
            "timetable:faculty:{}:{}",
            self.faculty_id,
            self.range.day.as_str()
        )];
        if let Some(room_id) = &self.room_id {
            keys.push(format!(
                "timetable:room:{}:{}",
                room_id,
                self.range.day.as_str()
            ));
        }
        keys
    }

    pub fn into_entry(self, id: Uuid, created_at: DateTime<Utc>) -> TimetableEntry {
        TimetableEntry {
            id,
            subject_id: self.subject_id,
            faculty_id: self.faculty_id,
            room_id: self.room_id,
            day_of_week: self.range.day,
            start_time: self.range.start,
            end_time: self.range.end,
            semester: self.semester,
            year: self.year,
            batch: self.batch,
            created_at,
        }
    }
}

/// Listing filter; every field set narrows the result.
#[derive(Debug, Clone, Default)]
pub struct TimetableFilter {
    pub semester: Option<i32>,
    pub year: Option<i32>,
    pub faculty_id: Option<String>,
    /// Restrict to these subjects. An empty list matches nothing.
    pub subject_ids: Option<Vec<Uuid>>,
}

impl TimetableFilter {
    pub fn matches(&self, entry: &TimetableEntry) -> bool {
        self.semester.map_or(true, |s| entry.semester == s)
            && self.year.map_or(true, |y| entry.year == y)
            && self
                .faculty_id
                .as_ref()
                .map_or(true, |f| &entry.faculty_id == f)
            && self
                .subject_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&entry.subject_id))
    }
}
