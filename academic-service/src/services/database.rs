//! PostgreSQL store for academic-service.

use crate::models::{
    AttendanceRecord, AttendanceStatus, DayOfWeek, ExamType, Mark, MarkFilter,
    NewAttendanceRecord, NewMark, NewSubject, NewTimetableEntry, Subject, TimetableEntry,
    TimetableFilter,
};
use crate::services::conflict::{ConflictChecker, ConflictReport};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{AcademicStore, ScheduleOutcome};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgExecutor, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const SUBJECT_COLUMNS: &str = "id, code, name, credits, semester, year, created_at";

const TIMETABLE_COLUMNS: &str = "id, subject_id, faculty_id, room_id, day_of_week, start_time, \
     end_time, semester, year, batch, created_at";

const MARK_COLUMNS: &str = "id, student_id, subject_id, faculty_id, exam_type, max_marks, \
     obtained_marks, semester, year, created_at";

const ATTENDANCE_COLUMNS: &str = "id, student_id, subject_id, faculty_id, date, status, created_at";

/// SQLSTATE raised when a SERIALIZABLE transaction cannot be committed.
const SERIALIZATION_FAILURE: &str = "40001";

pub const DEFAULT_SERIALIZATION_RETRIES: u32 = 3;

#[derive(Debug, FromRow)]
struct TimetableRow {
    id: Uuid,
    subject_id: Uuid,
    faculty_id: String,
    room_id: Option<String>,
    day_of_week: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
    semester: i32,
    year: i32,
    batch: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TimetableRow> for TimetableEntry {
    type Error = sqlx::Error;

    fn try_from(row: TimetableRow) -> Result<Self, Self::Error> {
        let day_of_week =
            DayOfWeek::from_number(row.day_of_week).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "day_of_week".to_string(),
                source: format!("Unknown day number {}", row.day_of_week).into(),
            })?;

        Ok(Self {
            id: row.id,
            subject_id: row.subject_id,
            faculty_id: row.faculty_id,
            room_id: row.room_id,
            day_of_week,
            start_time: row.start_time,
            end_time: row.end_time,
            semester: row.semester,
            year: row.year,
            batch: row.batch,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MarkRow {
    id: Uuid,
    student_id: String,
    subject_id: Uuid,
    faculty_id: String,
    exam_type: String,
    max_marks: f64,
    obtained_marks: f64,
    semester: i32,
    year: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<MarkRow> for Mark {
    type Error = AppError;

    fn try_from(row: MarkRow) -> Result<Self, Self::Error> {
        let exam_type = ExamType::parse(&row.exam_type).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Unknown exam type '{}'", row.exam_type))
        })?;

        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            subject_id: row.subject_id,
            faculty_id: row.faculty_id,
            exam_type,
            max_marks: row.max_marks,
            obtained_marks: row.obtained_marks,
            semester: row.semester,
            year: row.year,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AttendanceRow {
    id: Uuid,
    student_id: String,
    subject_id: Uuid,
    faculty_id: String,
    date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown attendance status '{}'",
                row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            subject_id: row.subject_id,
            faculty_id: row.faculty_id,
            date: row.date,
            status,
            created_at: row.created_at,
        })
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(SERIALIZATION_FAILURE),
        _ => false,
    }
}

fn missing_subject(err: sqlx::Error, subject_id: Uuid) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound(anyhow::anyhow!("Subject {} not found", subject_id))
        }
        other => AppError::from(other),
    }
}

/// Entries that could clash with `proposed`: same day, overlapping time,
/// and either the same faculty in the same term or the same room.
async fn overlapping_entries<'e>(
    executor: impl PgExecutor<'e>,
    proposed: &NewTimetableEntry,
) -> Result<Vec<TimetableEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TimetableRow>(&format!(
        r#"
        SELECT {} FROM timetable_entries
        WHERE day_of_week = $1
          AND start_time < $3
          AND end_time > $2
          AND ((faculty_id = $4 AND semester = $5 AND year = $6)
               OR ($7::VARCHAR IS NOT NULL AND room_id = $7))
        ORDER BY start_time
        "#,
        TIMETABLE_COLUMNS
    ))
    .bind(proposed.range.day.number())
    .bind(proposed.range.start)
    .bind(proposed.range.end)
    .bind(&proposed.faculty_id)
    .bind(proposed.semester)
    .bind(proposed.year)
    .bind(&proposed.room_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(TimetableEntry::try_from).collect()
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    serialization_retries: u32,
}

impl Database {
    #[instrument(skip(database_url), fields(service = "academic-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self {
            pool,
            serialization_retries: DEFAULT_SERIALIZATION_RETRIES,
        })
    }

    /// Attempts made for a timetable insert that keeps losing serialization.
    pub fn with_serialization_retries(mut self, retries: u32) -> Self {
        self.serialization_retries = retries.max(1);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn try_create_timetable_entry(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ScheduleOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let existing = overlapping_entries(&mut *tx, proposed).await?;
        let report = ConflictChecker::check(proposed, &existing);
        if report.has_conflicts() {
            tx.rollback().await?;
            return Ok(ScheduleOutcome::Conflict(report));
        }

        let row = sqlx::query_as::<_, TimetableRow>(&format!(
            r#"
            INSERT INTO timetable_entries
                (id, subject_id, faculty_id, room_id, day_of_week, start_time, end_time, semester, year, batch)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            TIMETABLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(proposed.subject_id)
        .bind(&proposed.faculty_id)
        .bind(&proposed.room_id)
        .bind(proposed.range.day.number())
        .bind(proposed.range.start)
        .bind(proposed.range.end)
        .bind(proposed.semester)
        .bind(proposed.year)
        .bind(&proposed.batch)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ScheduleOutcome::Created(TimetableEntry::try_from(row)?))
    }
}

#[async_trait]
impl AcademicStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, subject), fields(code = %subject.code))]
    async fn insert_subject(&self, subject: &NewSubject) -> Result<Subject, AppError> {
        let record = sqlx::query_as::<_, Subject>(&format!(
            r#"
            INSERT INTO subjects (id, code, name, credits, semester, year)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SUBJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(subject.credits)
        .bind(subject.semester)
        .bind(subject.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Subject code '{}' already exists",
                    subject.code
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert subject: {}", e)),
        })?;

        Ok(record)
    }

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(&format!(
            "SELECT {} FROM subjects WHERE id = $1",
            SUBJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subject)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let subjects = sqlx::query_as::<_, Subject>(&format!(
            "SELECT {} FROM subjects ORDER BY code",
            SUBJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(subjects)
    }

    async fn find_conflicts(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ConflictReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_conflicts"])
            .start_timer();

        let existing = overlapping_entries(&self.pool, proposed).await?;

        timer.observe_duration();
        Ok(ConflictChecker::check(proposed, &existing))
    }

    #[instrument(skip(self, proposed), fields(faculty_id = %proposed.faculty_id, day = %proposed.range.day))]
    async fn create_timetable_entry(
        &self,
        proposed: &NewTimetableEntry,
    ) -> Result<ScheduleOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_timetable_entry"])
            .start_timer();

        let mut attempt = 1;
        let outcome = loop {
            match self.try_create_timetable_entry(proposed).await {
                Err(e) if is_serialization_failure(&e) && attempt < self.serialization_retries => {
                    warn!(attempt = attempt, "Timetable insert lost serialization, retrying");
                    attempt += 1;
                }
                other => break other.map_err(|e| missing_subject(e, proposed.subject_id))?,
            }
        };

        timer.observe_duration();
        Ok(outcome)
    }

    async fn list_timetable(
        &self,
        filter: &TimetableFilter,
    ) -> Result<Vec<TimetableEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_timetable"])
            .start_timer();

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM timetable_entries WHERE TRUE",
            TIMETABLE_COLUMNS
        ));
        if let Some(semester) = filter.semester {
            query.push(" AND semester = ").push_bind(semester);
        }
        if let Some(year) = filter.year {
            query.push(" AND year = ").push_bind(year);
        }
        if let Some(faculty_id) = &filter.faculty_id {
            query.push(" AND faculty_id = ").push_bind(faculty_id.clone());
        }
        if let Some(subject_ids) = &filter.subject_ids {
            query
                .push(" AND subject_id = ANY(")
                .push_bind(subject_ids.clone())
                .push(")");
        }
        query.push(" ORDER BY day_of_week, start_time");

        let rows: Vec<TimetableRow> = query.build_query_as().fetch_all(&self.pool).await?;

        timer.observe_duration();
        Ok(rows
            .into_iter()
            .map(TimetableEntry::try_from)
            .collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self))]
    async fn delete_timetable_entry(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM timetable_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted == 1)
    }

    #[instrument(skip(self, mark), fields(student_id = %mark.student_id, subject_id = %mark.subject_id))]
    async fn insert_mark(&self, mark: &NewMark) -> Result<Mark, AppError> {
        mark.check_bounds()?;

        let row = sqlx::query_as::<_, MarkRow>(&format!(
            r#"
            INSERT INTO marks
                (id, student_id, subject_id, faculty_id, exam_type, max_marks, obtained_marks, semester, year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            MARK_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&mark.student_id)
        .bind(mark.subject_id)
        .bind(&mark.faculty_id)
        .bind(mark.exam_type.as_str())
        .bind(mark.max_marks)
        .bind(mark.obtained_marks)
        .bind(mark.semester)
        .bind(mark.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| missing_subject(e, mark.subject_id))?;

        row.try_into()
    }

    async fn list_marks(&self, filter: &MarkFilter) -> Result<Vec<Mark>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_marks"])
            .start_timer();

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM marks WHERE TRUE",
            MARK_COLUMNS
        ));
        if let Some(student_id) = &filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id.clone());
        }
        if let Some(subject_id) = filter.subject_id {
            query.push(" AND subject_id = ").push_bind(subject_id);
        }
        if let Some(faculty_id) = &filter.faculty_id {
            query.push(" AND faculty_id = ").push_bind(faculty_id.clone());
        }
        if let Some(exam_type) = filter.exam_type {
            query.push(" AND exam_type = ").push_bind(exam_type.as_str());
        }
        if let Some(semester) = filter.semester {
            query.push(" AND semester = ").push_bind(semester);
        }
        if let Some(year) = filter.year {
            query.push(" AND year = ").push_bind(year);
        }
        query.push(" ORDER BY created_at DESC");

        let rows: Vec<MarkRow> = query.build_query_as().fetch_all(&self.pool).await?;

        timer.observe_duration();
        rows.into_iter().map(Mark::try_from).collect()
    }

    #[instrument(skip(self, records), fields(rows = records.len()))]
    async fn record_attendance(
        &self,
        records: &[NewAttendanceRecord],
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(records.len());

        for record in records {
            let row = sqlx::query_as::<_, AttendanceRow>(&format!(
                r#"
                INSERT INTO attendance_records (id, student_id, subject_id, faculty_id, date, status)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (student_id, subject_id, date) DO UPDATE
                SET status = EXCLUDED.status,
                    faculty_id = EXCLUDED.faculty_id
                RETURNING {}
                "#,
                ATTENDANCE_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(&record.student_id)
            .bind(record.subject_id)
            .bind(&record.faculty_id)
            .bind(record.date)
            .bind(record.status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| missing_subject(e, record.subject_id))?;

            saved.push(AttendanceRecord::try_from(row)?);
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn list_attendance(&self, student_id: &str) -> Result<Vec<AttendanceRecord>, AppError> {
        let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance_records WHERE student_id = $1 ORDER BY date DESC",
            ATTENDANCE_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }
}
