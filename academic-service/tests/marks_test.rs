//! Marks, grading, transcripts and analytics over HTTP.

mod common;

use academic_service::config::AcademicSettings;
use common::{mark, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn mark_is_returned_with_percentage_and_grade() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let response = app.record_mark("S1", &subject, 85.0, 100.0).await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["percentage"], 85.0);
    assert_eq!(body["grade"], "A");
    assert_eq!(body["student_id"], "S1");
    assert_eq!(body["exam_type"], "FINAL");
}

#[tokio::test]
async fn out_of_bounds_marks_are_rejected() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let over = app.record_mark("S1", &subject, 101.0, 100.0).await;
    assert_eq!(over.status().as_u16(), 400);
    let body: Value = over.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let negative = app.record_mark("S1", &subject, -1.0, 100.0).await;
    assert_eq!(negative.status().as_u16(), 422);

    let unknown = app
        .record_mark("S1", "7f1b3c9e-0d1a-4a57-9a0f-3b2f4f5c6d7e", 10.0, 20.0)
        .await;
    assert_eq!(unknown.status().as_u16(), 404);

    let listed: Vec<Value> = app.get("/api/marks").await.json().await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn zero_max_marks_grade_as_zero_percent() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let body: Value = app
        .record_mark("S1", &subject, 0.0, 0.0)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["percentage"], 0.0);
    assert_eq!(body["grade"], "F");
}

#[tokio::test]
async fn batch_reports_each_row() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let response = app
        .post_json(
            "/api/marks/batch",
            &json!({
                "marks": [
                    mark("S1", &subject, 45.0, 50.0),
                    mark("S2", &subject, 60.0, 50.0),
                    mark("S3", "7f1b3c9e-0d1a-4a57-9a0f-3b2f4f5c6d7e", 10.0, 50.0),
                    mark("", &subject, 10.0, 50.0),
                    mark("S5", &subject, 20.0, 50.0)
                ]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["recorded"], 2);
    assert_eq!(body["failed"], 3);

    let results = body["results"].as_array().unwrap();
    let successes: Vec<bool> = results
        .iter()
        .map(|r| r["success"].as_bool().unwrap())
        .collect();
    assert_eq!(successes, vec![true, false, false, false, true]);
    assert_eq!(results[0]["mark"]["grade"], "A+");
    assert!(results[1]["error"].is_string());
    assert_eq!(results[4]["index"], 4);

    let listed: Vec<Value> = app.get("/api/marks").await.json().await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let app = TestApp::spawn_with(
        1000,
        AcademicSettings {
            max_mark_batch: 2,
            ..Default::default()
        },
    )
    .await;
    let subject = app.add_subject("CS301", 4).await;

    let rows: Vec<Value> = (0..3)
        .map(|i| mark(&format!("S{}", i), &subject, 10.0, 20.0))
        .collect();
    let response = app
        .post_json("/api/marks/batch", &json!({ "marks": rows }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let empty = app
        .post_json("/api/marks/batch", &json!({ "marks": [] }))
        .await;
    assert_eq!(empty.status().as_u16(), 422);
}

#[tokio::test]
async fn marks_listing_is_filtered() {
    let app = TestApp::spawn().await;
    let maths = app.add_subject("MA201", 3).await;
    let physics = app.add_subject("PH201", 3).await;

    app.record_mark("S1", &maths, 70.0, 100.0).await;
    app.record_mark("S1", &physics, 40.0, 100.0).await;
    app.record_mark("S2", &maths, 95.0, 100.0).await;

    let s1: Vec<Value> = app
        .get("/api/marks?student_id=S1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(s1.len(), 2);

    let maths_marks: Vec<Value> = app
        .get(&format!("/api/marks?subject_id={}", maths))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(maths_marks.len(), 2);

    let quizzes: Vec<Value> = app
        .get("/api/marks?exam_type=QUIZ")
        .await
        .json()
        .await
        .unwrap();
    assert!(quizzes.is_empty());
}

#[tokio::test]
async fn transcript_weights_gpa_by_credits() {
    let app = TestApp::spawn().await;
    let heavy = app.add_subject("CS301", 4).await;
    let light = app.add_subject("HS101", 2).await;

    // CS301: 45 + 45 of 100 => 90% => 10 points.
    app.post_json("/api/marks", &{
        let mut m = mark("S1", &heavy, 45.0, 50.0);
        m["exam_type"] = json!("MIDTERM");
        m
    })
    .await;
    app.record_mark("S1", &heavy, 45.0, 50.0).await;
    // HS101: 55% => 6 points.
    app.record_mark("S1", &light, 55.0, 100.0).await;
    // Another student's marks stay out.
    app.record_mark("S2", &light, 10.0, 100.0).await;

    let response = app.get("/api/students/S1/transcript").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    let semesters = body["semesters"].as_array().unwrap();
    assert_eq!(semesters.len(), 1);
    let subjects = semesters[0]["subjects"].as_array().unwrap();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0]["subject_code"], "CS301");
    assert_eq!(subjects[0]["grade"], "A+");

    // Each mark weighs in: (10 * 4 + 10 * 4 + 6 * 2) / 10
    let gpa = body["overall_gpa"].as_f64().unwrap();
    assert!((gpa - 9.2).abs() < 1e-9);
    assert_eq!(body["total_credits"], 6);
}

#[tokio::test]
async fn transcript_without_marks_has_zero_gpa() {
    let app = TestApp::spawn().await;

    let body: Value = app
        .get("/api/students/NOBODY/transcript")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["overall_gpa"], 0.0);
    assert!(body["semesters"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn performance_analytics_count_grades_and_average_subjects() {
    let app = TestApp::spawn().await;
    let maths = app.add_subject("MA201", 3).await;
    let physics = app.add_subject("PH201", 3).await;

    app.record_mark("S1", &maths, 92.0, 100.0).await;
    app.record_mark("S2", &maths, 81.0, 100.0).await;
    app.record_mark("S3", &physics, 30.0, 100.0).await;

    let body: Value = app
        .get("/api/analytics/performance")
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["total_assessments"], 3);
    let distribution = body["grade_distribution"].as_array().unwrap();
    assert_eq!(distribution.len(), 6);
    let count = |grade: &str| {
        distribution
            .iter()
            .find(|g| g["grade"] == grade)
            .map(|g| g["count"].as_u64().unwrap())
            .unwrap()
    };
    assert_eq!(count("A+"), 1);
    assert_eq!(count("A"), 1);
    assert_eq!(count("F"), 1);
    assert_eq!(count("B"), 0);

    let subjects = body["subject_performance"].as_array().unwrap();
    assert_eq!(subjects[0]["subject_code"], "MA201");
    assert_eq!(subjects[0]["average_score"], 86.5);
    assert_eq!(subjects[1]["subject_code"], "PH201");

    let filtered: Value = app
        .get(&format!("/api/analytics/performance?subject_id={}", physics))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(filtered["total_assessments"], 1);
}

#[tokio::test]
async fn duplicate_subject_codes_conflict() {
    let app = TestApp::spawn().await;
    app.add_subject("CS301", 4).await;

    let response = app
        .post_json(
            "/api/subjects",
            &json!({ "code": "cs301", "name": "Again", "credits": 4, "semester": 3 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let subjects: Vec<Value> = app.get("/api/subjects").await.json().await.unwrap();
    assert_eq!(subjects.len(), 1);
}
