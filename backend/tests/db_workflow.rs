//! End-to-end checks against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test --features db-tests`.
//! Every test registers members with unique emails, so the suite can share
//! one database and be re-run.
#![cfg(feature = "db-tests")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web};
use chrono::Utc;
use schoolapp_backend::relations::{replace_links, PARENT_STUDENTS};
use schoolapp_backend::{create_app, init_db, AppState};
use serde_json::{json, Value};

static COUNTER: AtomicU32 = AtomicU32::new(0);

async fn state() -> web::Data<AppState> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db-tests");
    let db = init_db(&url, 5).await.expect("database should be reachable");
    web::Data::new(AppState {
        db,
        jwt_secret: "db-workflow-secret-0123456789".to_string(),
        token_ttl_minutes: 60,
    })
}

fn unique_email(tag: &str) -> String {
    format!(
        "{}-{}-{}@school.test",
        tag,
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

fn register_req(role: &str, email: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "surname": "Tester",
            "name": role,
            "phone": "+380501234567",
            "email": email,
            "password": "pass-123456",
            "role": role
        }))
}

fn login_req(email: &str, password: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": email, "password": password }))
}

fn authed(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
}

macro_rules! send {
    ($app:expr, $req:expr) => {
        test::call_service(&$app, $req.to_request()).await
    };
}

/// Registers a member of `role` and logs in; yields `(member_id, token)`.
macro_rules! signup {
    ($app:expr, $role:expr) => {{
        let email = unique_email($role);
        let resp = send!($app, register_req($role, &email));
        assert_eq!(resp.status(), StatusCode::CREATED);
        let profile: Value = test::read_body_json(resp).await;

        let resp = send!($app, login_req(&email, "pass-123456"));
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;

        (
            profile["id"].as_i64().unwrap() as i32,
            body["token"].as_str().unwrap().to_string(),
        )
    }};
}

/// Creates an event as `token`; yields the event id.
macro_rules! create_event {
    ($app:expr, $token:expr, $body:expr) => {{
        let resp = send!(
            $app,
            authed(test::TestRequest::post().uri("/api/events"), &$token).set_json($body)
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        let event: Value = test::read_body_json(resp).await;
        event["id"].as_i64().unwrap() as i32
    }};
}

fn event_body(hidden: bool, participants: &[i32]) -> Value {
    json!({
        "event_type_id": 1,
        "name": "Algebra exam",
        "starts_at": "2025-05-12T09:00:00Z",
        "duration_minutes": 90,
        "content": "Chapters 1-4",
        "is_content_hidden": hidden,
        "venue_or_link": "Room 12",
        "participant_ids": participants
    })
}

#[actix_web::test]
async fn duplicate_email_is_rejected_without_orphans() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let email = unique_email("dup");

    let resp = send!(app, register_req("student", &email));
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(resp.headers().get(header::LOCATION).is_some());

    let resp = send!(app, register_req("parent", &email.to_uppercase()));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "A member with this email already exists");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE email = $1")
        .bind(&email)
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let parents: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM parents p JOIN members m ON m.id = p.id WHERE m.email = $1",
    )
    .bind(&email)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(parents, 0);
}

#[actix_web::test]
async fn register_creates_exactly_one_specialization() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (student_id, _) = signup!(app, "student");

    let rows: (i64, i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM teachers WHERE id = $1),
                (SELECT COUNT(*) FROM students WHERE id = $1),
                (SELECT COUNT(*) FROM parents WHERE id = $1)",
    )
    .bind(student_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(rows, (0, 1, 0));
}

#[actix_web::test]
async fn login_failures_are_indistinguishable() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let email = unique_email("login");
    let resp = send!(app, register_req("teacher", &email));
    assert_eq!(resp.status(), StatusCode::CREATED);

    let wrong = send!(app, login_req(&email, "wrong-password"));
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    let wrong: Value = test::read_body_json(wrong).await;

    let missing = send!(app, login_req(&unique_email("ghost"), "pass-123456"));
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let missing: Value = test::read_body_json(missing).await;

    assert_eq!(wrong, missing);
    assert_eq!(wrong["error"], "Invalid email or password");

    let resp = send!(app, login_req(&email, "pass-123456"));
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap().to_string();

    let resp = send!(app, authed(test::TestRequest::get().uri("/api/auth/me"), &token));
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "teacher");
    assert!(me.get("password_hash").is_none());
}

#[actix_web::test]
async fn zero_duration_update_is_rejected() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let event_id = create_event!(app, teacher, event_body(false, &[]));

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&format!("/api/events/{}", event_id)), &teacher)
            .set_json(json!({ "duration_minutes": 0 }))
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&format!("/api/events/{}", event_id)), &teacher)
            .set_json(json!({ "name": "Algebra final" }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send!(
        app,
        authed(test::TestRequest::get().uri(&format!("/api/events/{}", event_id)), &teacher)
    );
    let event: Value = test::read_body_json(resp).await;
    assert_eq!(event["name"], "Algebra final");
    assert_eq!(event["duration_minutes"], 90);
}

#[actix_web::test]
async fn second_task_is_rejected_and_delete_cascades() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (_, teacher) = signup!(app, "teacher");
    let event_id = create_event!(app, teacher, event_body(false, &[]));
    let task_uri = format!("/api/events/{}/task", event_id);
    let task = json!({ "name": "Revise chapter 1", "due_at": "2025-05-11T18:00:00Z" });

    let resp = send!(app, authed(test::TestRequest::post().uri(&task_uri), &teacher).set_json(&task));
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send!(app, authed(test::TestRequest::post().uri(&task_uri), &teacher).set_json(&task));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Task already exists for this event. Use PUT to update.");

    let resp = send!(
        app,
        authed(test::TestRequest::delete().uri(&format!("/api/events/{}", event_id)), &teacher)
    );
    assert_eq!(resp.status(), StatusCode::OK);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = $1")
        .bind(event_id)
        .fetch_one(&state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let resp = send!(
        app,
        authed(test::TestRequest::get().uri(&format!("/api/tasks/{}", event_id)), &teacher)
    );
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn hidden_content_and_task_access() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (student_id, student) = signup!(app, "student");
    let (_, outsider) = signup!(app, "parent");

    let mut body = event_body(true, &[student_id]);
    body["task"] = json!({ "name": "Bring calculator", "due_at": "2025-05-12T08:00:00Z" });
    let event_id = create_event!(app, teacher, body);
    let event_uri = format!("/api/events/{}", event_id);
    let task_uri = format!("/api/tasks/{}", event_id);

    let resp = send!(app, authed(test::TestRequest::get().uri(&event_uri), &outsider));
    let seen: Value = test::read_body_json(resp).await;
    assert!(seen.get("content").is_none());
    assert_eq!(seen["has_task"], true);

    let resp = send!(app, authed(test::TestRequest::get().uri(&event_uri), &student));
    let seen: Value = test::read_body_json(resp).await;
    assert_eq!(seen["content"], "Chapters 1-4");
    assert_eq!(seen["participant_ids"], json!([student_id]));

    let resp = send!(app, authed(test::TestRequest::get().uri(&task_uri), &outsider));
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send!(app, authed(test::TestRequest::get().uri(&task_uri), &student));
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send!(app, authed(test::TestRequest::get().uri("/api/tasks"), &outsider));
    let visible: Value = test::read_body_json(resp).await;
    assert!(visible
        .as_array()
        .unwrap()
        .iter()
        .all(|task| task["id"] != event_id));
}

#[actix_web::test]
async fn completion_sets_and_clears_timestamp() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (student_id, student) = signup!(app, "student");

    let mut body = event_body(false, &[student_id]);
    body["task"] = json!({ "name": "Essay", "due_at": "2025-05-20T18:00:00Z" });
    let event_id = create_event!(app, teacher, body);
    let completion_uri = format!("/api/tasks/{}/completion", event_id);

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri(&completion_uri), &student)
            .set_json(json!({ "is_completed": true }))
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let task: Value = test::read_body_json(resp).await;
    assert_eq!(task["is_completed"], true);
    assert!(task["completed_at"].is_string());

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri(&completion_uri), &student)
            .set_json(json!({ "is_completed": false }))
    );
    let task: Value = test::read_body_json(resp).await;
    assert_eq!(task["is_completed"], false);
    assert!(task["completed_at"].is_null());
}

#[actix_web::test]
async fn parent_student_links_follow_replace_semantics() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (student_id, _) = signup!(app, "student");

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri("/api/parents"), &teacher).set_json(json!({
            "member": {
                "surname": "Melnyk",
                "name": "Iryna",
                "phone": "+380931112233",
                "email": unique_email("parent"),
                "password": "pass-123456"
            },
            "parent_type_id": 2,
            "student_ids": [student_id, 999999]
        }))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let parent: Value = test::read_body_json(resp).await;
    assert_eq!(parent["student_ids"], json!([student_id]));
    assert_eq!(parent["parent_type"]["name"], "Mother");
    let parent_uri = format!("/api/parents/{}", parent["id"]);

    // Absent list leaves links untouched.
    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&parent_uri), &teacher)
            .set_json(json!({ "parent_type_id": null }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send!(app, authed(test::TestRequest::get().uri(&parent_uri), &teacher));
    let parent: Value = test::read_body_json(resp).await;
    assert_eq!(parent["student_ids"], json!([student_id]));
    assert!(parent["parent_type"].is_null());

    // Empty list clears them.
    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&parent_uri), &teacher)
            .set_json(json!({ "student_ids": [] }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send!(app, authed(test::TestRequest::get().uri(&parent_uri), &teacher));
    let parent: Value = test::read_body_json(resp).await;
    assert_eq!(parent["student_ids"], json!([]));

    // Unknown ids are dropped on update as well.
    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&parent_uri), &teacher)
            .set_json(json!({ "student_ids": [student_id, 999999] }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send!(app, authed(test::TestRequest::get().uri(&parent_uri), &teacher));
    let parent: Value = test::read_body_json(resp).await;
    assert_eq!(parent["student_ids"], json!([student_id]));
}

#[actix_web::test]
async fn event_participants_follow_replace_semantics() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (first_id, _) = signup!(app, "student");
    let (second_id, _) = signup!(app, "student");
    let event_id = create_event!(app, teacher, event_body(false, &[first_id]));
    let event_uri = format!("/api/events/{}", event_id);

    macro_rules! participants {
        () => {{
            let resp = send!(app, authed(test::TestRequest::get().uri(&event_uri), &teacher));
            assert_eq!(resp.status(), StatusCode::OK);
            let event: Value = test::read_body_json(resp).await;
            event["participant_ids"].clone()
        }};
    }

    // Absent list leaves attendees untouched.
    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&event_uri), &teacher)
            .set_json(json!({ "name": "Algebra retake" }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(participants!(), json!([first_id]));

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&event_uri), &teacher)
            .set_json(json!({ "participant_ids": [second_id, 999999] }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(participants!(), json!([second_id]));

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&event_uri), &teacher)
            .set_json(json!({ "participant_ids": [] }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(participants!(), json!([]));
}

#[actix_web::test]
async fn overlapping_identical_replaces_both_succeed() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (parent_id, _) = signup!(app, "parent");
    let (student_id, _) = signup!(app, "student");

    let mut first = state.db.begin().await.unwrap();
    replace_links(&mut first, &PARENT_STUDENTS, parent_id, &[student_id])
        .await
        .unwrap();

    let db = state.db.clone();
    let second = actix_web::rt::spawn(async move {
        let mut tx = db.begin().await.unwrap();
        let result = replace_links(&mut tx, &PARENT_STUDENTS, parent_id, &[student_id]).await;
        tx.commit().await.unwrap();
        result
    });

    actix_web::rt::time::sleep(Duration::from_millis(300)).await;
    first.commit().await.unwrap();

    let second = second.await.unwrap();
    assert!(second.is_ok(), "{:?}", second.err());

    let links: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM parent_students WHERE parent_id = $1 AND student_id = $2",
    )
    .bind(parent_id)
    .bind(student_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(links, 1);
}

#[actix_web::test]
async fn racing_task_insert_reports_existing_task() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (_, teacher) = signup!(app, "teacher");
    let event_id = create_event!(app, teacher, event_body(false, &[]));

    // Another writer holds an uncommitted task for the event while the
    // request runs its existence check, then commits.
    let mut other = state.db.begin().await.unwrap();
    sqlx::query("INSERT INTO tasks (id, name, due_at) VALUES ($1, 'Other task', NOW())")
        .bind(event_id)
        .execute(&mut *other)
        .await
        .unwrap();
    let committer = actix_web::rt::spawn(async move {
        actix_web::rt::time::sleep(Duration::from_millis(300)).await;
        other.commit().await.unwrap();
    });

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri(&format!("/api/events/{}/task", event_id)), &teacher)
            .set_json(json!({ "name": "Revise chapter 2", "due_at": "2025-05-11T18:00:00Z" }))
    );
    committer.await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Task already exists for this event. Use PUT to update.");
}

#[actix_web::test]
async fn teacher_owning_a_group_cannot_be_deleted() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (_, admin) = signup!(app, "teacher");
    let (owner_id, _) = signup!(app, "teacher");

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri("/api/groups"), &admin)
            .set_json(json!({ "name": "7-C", "teacher_id": owner_id }))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send!(
        app,
        authed(test::TestRequest::delete().uri(&format!("/api/teachers/{}", owner_id)), &admin)
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let rows: (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM members WHERE id = $1),
                (SELECT COUNT(*) FROM teachers WHERE id = $1)",
    )
    .bind(owner_id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(rows, (1, 1));
}

#[actix_web::test]
async fn group_with_students_cannot_be_deleted() {
    let state = state().await;
    let app = test::init_service(create_app(state.clone())).await;
    let (teacher_id, teacher) = signup!(app, "teacher");
    let (student_id, _) = signup!(app, "student");

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri("/api/groups"), &teacher).set_json(json!({
            "name": "8-A",
            "teacher_id": teacher_id,
            "student_ids": [student_id]
        }))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let group: Value = test::read_body_json(resp).await;
    let group_id = group["id"].as_i64().unwrap() as i32;

    let resp = send!(
        app,
        authed(test::TestRequest::delete().uri(&format!("/api/groups/{}", group_id)), &teacher)
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let still_grouped: Option<i32> =
        sqlx::query_scalar("SELECT group_id FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(still_grouped, Some(group_id));

    let resp = send!(app, authed(test::TestRequest::get().uri("/api/groups"), &teacher));
    assert_eq!(resp.status(), StatusCode::OK);
    let groups: Value = test::read_body_json(resp).await;
    let listed = groups
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["id"] == group_id)
        .cloned()
        .unwrap();
    assert_eq!(listed["teacher"]["id"], teacher_id);
    assert_eq!(listed["students"][0]["id"], student_id);
}

#[actix_web::test]
async fn attendance_is_upserted() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (student_id, student) = signup!(app, "student");
    let event_id = create_event!(app, teacher, event_body(false, &[student_id]));
    let response_uri = format!("/api/events/{}/response", event_id);

    for attending in [true, false] {
        let resp = send!(
            app,
            authed(test::TestRequest::put().uri(&response_uri), &student)
                .set_json(json!({ "is_attending": attending }))
        );
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = send!(
        app,
        authed(
            test::TestRequest::get().uri(&format!("/api/events/{}/responses", event_id)),
            &teacher
        )
    );
    let responses: Value = test::read_body_json(resp).await;
    let responses = responses.as_array().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["member"]["id"], student_id);
    assert_eq!(responses[0]["is_attending"], false);
}

#[actix_web::test]
async fn comment_permissions() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");
    let (student_id, student) = signup!(app, "student");
    let (parent_id, parent) = signup!(app, "parent");
    let event_id = create_event!(app, teacher, event_body(false, &[student_id, parent_id]));
    let comments_uri = format!("/api/events/{}/comments", event_id);

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri(&comments_uri), &student)
            .set_json(json!({ "content": "   " }))
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri(&comments_uri), &student)
            .set_json(json!({ "content": "Is the calculator allowed?" }))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: Value = test::read_body_json(resp).await;
    let comment_uri = format!("{}/{}", comments_uri, comment["id"]);

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&comment_uri), &parent)
            .set_json(json!({ "content": "Edited by someone else" }))
    );
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send!(
        app,
        authed(test::TestRequest::put().uri(&comment_uri), &student)
            .set_json(json!({ "content": "Is a scientific calculator allowed?" }))
    );
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send!(app, authed(test::TestRequest::delete().uri(&comment_uri), &parent));
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send!(app, authed(test::TestRequest::delete().uri(&comment_uri), &teacher));
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send!(app, authed(test::TestRequest::get().uri(&comments_uri), &student));
    let comments: Value = test::read_body_json(resp).await;
    assert_eq!(comments, json!([]));
}

#[actix_web::test]
async fn referenced_event_type_cannot_be_deleted() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, teacher) = signup!(app, "teacher");

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri("/api/event-types"), &teacher)
            .set_json(json!({ "name": "Olympiad" }))
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let event_type: Value = test::read_body_json(resp).await;

    let mut body = event_body(false, &[]);
    body["event_type_id"] = event_type["id"].clone();
    create_event!(app, teacher, body);

    let resp = send!(
        app,
        authed(
            test::TestRequest::delete().uri(&format!("/api/event-types/{}", event_type["id"])),
            &teacher
        )
    );
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn non_teachers_cannot_manage_people() {
    let state = state().await;
    let app = test::init_service(create_app(state)).await;
    let (_, student) = signup!(app, "student");

    let resp = send!(
        app,
        authed(test::TestRequest::post().uri("/api/teachers"), &student).set_json(json!({
            "member": {
                "surname": "Impostor",
                "name": "Ivan",
                "phone": "+380501234567",
                "email": unique_email("impostor"),
                "password": "pass-123456"
            }
        }))
    );
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
