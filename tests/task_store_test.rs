// ABOUTME: Integration tests for the owner-scoped task store
// ABOUTME: Covers creation validation, ordering, and owner scoping on delete

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::test_database;
use luma_context_server::errors::ErrorCode;
use luma_context_server::models::{NewTask, TaskImportance};

#[tokio::test]
async fn tasks_list_oldest_first_per_user() {
    let db = test_database().await;
    let user_id = Uuid::new_v4();
    let other = Uuid::new_v4();

    for title in ["first", "second", "third"] {
        db.create_task(
            user_id,
            &NewTask {
                title: title.into(),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();
    }
    db.create_task(
        other,
        &NewTask {
            title: "someone else's".into(),
            ..NewTask::default()
        },
    )
    .await
    .unwrap();

    let tasks = db.list_tasks(user_id).await.unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();

    assert_eq!(titles, ["first", "second", "third"]);
}

#[tokio::test]
async fn task_fields_round_trip() {
    let db = test_database().await;
    let user_id = Uuid::new_v4();
    let due = Utc::now() + Duration::days(2);

    let created = db
        .create_task(
            user_id,
            &NewTask {
                title: "book flights".into(),
                description: Some("aim for the morning one".into()),
                due_date: Some(due),
                importance: Some(TaskImportance::High),
            },
        )
        .await
        .unwrap();

    let tasks = db.list_tasks(user_id).await.unwrap();
    assert_eq!(tasks.len(), 1);

    let task = &tasks[0];
    assert_eq!(task.id, created.id);
    assert_eq!(task.title, "book flights");
    assert_eq!(task.description.as_deref(), Some("aim for the morning one"));
    assert_eq!(
        task.due_date.map(|t| t.timestamp_millis()),
        Some(due.timestamp_millis())
    );
    assert_eq!(task.importance, TaskImportance::High);
    assert!(!task.is_complete);
}

#[tokio::test]
async fn empty_titles_are_rejected() {
    let db = test_database().await;
    let user_id = Uuid::new_v4();

    for title in ["", "   "] {
        let error = db
            .create_task(
                user_id,
                &NewTask {
                    title: title.into(),
                    ..NewTask::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::InvalidInput);
    }

    assert!(db.list_tasks(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_scoped_to_the_owner() {
    let db = test_database().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    let task = db
        .create_task(
            owner,
            &NewTask {
                title: "private".into(),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();

    // Another user's delete looks identical to a missing task
    let error = db.delete_task(intruder, task.id).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
    assert_eq!(db.list_tasks(owner).await.unwrap().len(), 1);

    db.delete_task(owner, task.id).await.unwrap();
    assert!(db.list_tasks(owner).await.unwrap().is_empty());

    let error = db.delete_task(owner, task.id).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
}
