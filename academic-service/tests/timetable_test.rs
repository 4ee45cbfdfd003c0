//! Timetable scheduling over HTTP.

mod common;

use common::{slot, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn overlapping_faculty_slot_is_rejected() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let first = app
        .schedule(&slot(&subject, "F1", None, "MONDAY", "09:00", "10:00"))
        .await;
    assert_eq!(first.status().as_u16(), 201);
    let created: Value = first.json().await.unwrap();
    assert_eq!(created["start_time"], "09:00");
    assert_eq!(created["day_of_week"], "MONDAY");

    let second = app
        .schedule(&slot(&subject, "F1", None, "MONDAY", "09:30", "10:30"))
        .await;
    assert_eq!(second.status().as_u16(), 409);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");
    assert_eq!(body["details"]["faculty_conflicts"], 1);
    assert_eq!(body["details"]["conflicts"][0]["id"], created["id"]);

    let entries: Vec<Value> = app.get("/api/timetable").await.json().await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn touching_slots_and_other_days_do_not_conflict() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    for (day, start, end) in [
        ("MONDAY", "09:00", "10:00"),
        ("MONDAY", "10:00", "11:00"),
        ("TUESDAY", "09:00", "10:00"),
    ] {
        let response = app
            .schedule(&slot(&subject, "F1", Some("R101"), day, start, end))
            .await;
        assert_eq!(response.status().as_u16(), 201, "{} {}-{}", day, start, end);
    }
}

#[tokio::test]
async fn room_is_shared_across_terms() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    app.schedule(&slot(&subject, "F1", Some("R101"), "WEDNESDAY", "14:00", "15:00"))
        .await;

    // Different faculty and a different semester, same room and time.
    let mut other_term = slot(&subject, "F2", Some("R101"), "WEDNESDAY", "14:30", "15:30");
    other_term["semester"] = json!(5);

    let response = app.schedule(&other_term).await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["details"]["room_conflicts"], 1);
    assert_eq!(body["details"]["faculty_conflicts"], 0);
}

#[tokio::test]
async fn faculty_may_teach_same_slot_in_another_term() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    app.schedule(&slot(&subject, "F1", None, "FRIDAY", "09:00", "10:00"))
        .await;

    let mut next_year = slot(&subject, "F1", None, "FRIDAY", "09:00", "10:00");
    next_year["year"] = json!(2025);

    assert_eq!(app.schedule(&next_year).await.status().as_u16(), 201);
}

#[tokio::test]
async fn dry_run_reports_without_inserting() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;
    app.schedule(&slot(&subject, "F1", Some("R1"), "THURSDAY", "11:00", "12:00"))
        .await;

    let response = app
        .post_json(
            "/api/timetable/check",
            &slot(&subject, "F1", Some("R1"), "THURSDAY", "11:30", "12:30"),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["has_conflicts"], true);
    assert_eq!(report["faculty_conflicts"].as_array().unwrap().len(), 1);
    assert_eq!(report["room_conflicts"].as_array().unwrap().len(), 1);

    let free = app
        .post_json(
            "/api/timetable/check",
            &slot(&subject, "F1", Some("R1"), "THURSDAY", "12:00", "13:00"),
        )
        .await;
    let report: Value = free.json().await.unwrap();
    assert_eq!(report["has_conflicts"], false);

    let entries: Vec<Value> = app.get("/api/timetable").await.json().await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn invalid_ranges_and_unknown_subjects_are_rejected() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let inverted = app
        .schedule(&slot(&subject, "F1", None, "MONDAY", "10:00", "09:00"))
        .await;
    assert_eq!(inverted.status().as_u16(), 400);
    let body: Value = inverted.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let empty = app
        .schedule(&slot(&subject, "F1", None, "MONDAY", "10:00", "10:00"))
        .await;
    assert_eq!(empty.status().as_u16(), 400);

    let unknown = app
        .schedule(&slot(
            "7f1b3c9e-0d1a-4a57-9a0f-3b2f4f5c6d7e",
            "F1",
            None,
            "MONDAY",
            "09:00",
            "10:00",
        ))
        .await;
    assert_eq!(unknown.status().as_u16(), 404);

    let blank_faculty = app
        .schedule(&slot(&subject, "", None, "MONDAY", "09:00", "10:00"))
        .await;
    assert_eq!(blank_faculty.status().as_u16(), 422);
}

#[tokio::test]
async fn listing_filters_and_orders_entries() {
    let app = TestApp::spawn().await;
    let maths = app.add_subject("MA201", 3).await;
    let physics = app.add_subject("PH201", 3).await;

    app.schedule(&slot(&physics, "F2", None, "TUESDAY", "09:00", "10:00"))
        .await;
    app.schedule(&slot(&maths, "F1", None, "MONDAY", "11:00", "12:00"))
        .await;
    app.schedule(&slot(&maths, "F1", None, "MONDAY", "08:00", "09:00"))
        .await;

    let all: Vec<Value> = app.get("/api/timetable").await.json().await.unwrap();
    let order: Vec<(&str, &str)> = all
        .iter()
        .map(|e| {
            (
                e["day_of_week"].as_str().unwrap(),
                e["start_time"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![("MONDAY", "08:00"), ("MONDAY", "11:00"), ("TUESDAY", "09:00")]
    );

    let by_faculty: Vec<Value> = app
        .get("/api/timetable?faculty_id=F2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_faculty.len(), 1);

    let by_subject: Vec<Value> = app
        .get(&format!("/api/timetable?subject_ids={}", maths))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_subject.len(), 2);

    let no_subjects: Vec<Value> = app
        .get("/api/timetable?subject_ids=")
        .await
        .json()
        .await
        .unwrap();
    assert!(no_subjects.is_empty());

    let other_term: Vec<Value> = app
        .get("/api/timetable?semester=4")
        .await
        .json()
        .await
        .unwrap();
    assert!(other_term.is_empty());

    let bad = app.get("/api/timetable?subject_ids=nope").await;
    assert_eq!(bad.status().as_u16(), 400);
}

#[tokio::test]
async fn deleting_an_entry_frees_the_slot() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let created: Value = app
        .schedule(&slot(&subject, "F1", None, "SATURDAY", "09:00", "10:00"))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    assert_eq!(
        app.delete(&format!("/api/timetable/{}", id))
            .await
            .status()
            .as_u16(),
        204
    );
    assert_eq!(
        app.delete(&format!("/api/timetable/{}", id))
            .await
            .status()
            .as_u16(),
        404
    );

    let again = app
        .schedule(&slot(&subject, "F1", None, "SATURDAY", "09:30", "10:30"))
        .await;
    assert_eq!(again.status().as_u16(), 201);
}

#[tokio::test]
async fn concurrent_overlapping_requests_admit_one() {
    let app = TestApp::spawn().await;
    let subject = app.add_subject("CS301", 4).await;

    let first = slot(&subject, "F1", Some("R1"), "MONDAY", "13:00", "14:00");
    let second = slot(&subject, "F1", Some("R2"), "MONDAY", "13:30", "14:30");
    let (a, b) = tokio::join!(app.schedule(&first), app.schedule(&second));

    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 409]);
}
