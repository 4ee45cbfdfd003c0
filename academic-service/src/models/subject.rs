use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Weight of the subject in GPA aggregation.
    pub credits: i32,
    pub semester: i32,
    pub year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    pub credits: i32,
    pub semester: i32,
    pub year: Option<i32>,
}
