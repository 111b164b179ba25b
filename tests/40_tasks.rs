mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{read, TestServer};

async fn create_task(server: &TestServer, admin: &str, assignee: Uuid, due_in_days: i64) -> Result<Value> {
    let due = (Utc::now() + Duration::days(due_in_days)).to_rfc3339();
    let res = server
        .post_json(
            "/api/tasks",
            admin,
            &json!({
                "title": "Contestar demanda",
                "dueDate": due,
                "assignedTo": assignee,
                "priority": "alta",
                "tags": ["laboral", " laboral ", ""],
            }),
        )
        .await?;
    let (status, body) = read(res).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, body);
    Ok(body["data"].clone())
}

#[tokio::test]
async fn assignees_see_only_their_tasks() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;
    let (_, beto_token) = server.user_with_token("beto@koop.test").await?;

    let task = create_task(&server, &admin, ana.id, 2).await?;
    assert_eq!(task["status"], "pendiente");
    assert_eq!(task["priority"], "alta");
    assert_eq!(task["tags"], json!(["laboral"]));
    assert_eq!(task["isOverdue"], false);
    let id = task["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = read(server.get("/api/tasks", &ana_token).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert!(body["data"].get("stats").is_none());

    let (_, body) = read(server.get("/api/tasks", &beto_token).await?).await?;
    assert_eq!(body["data"]["pagination"]["total"], 0);

    let res = server.get(&format!("/api/tasks/{}", id), &beto_token).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (_, body) = read(server.get("/api/tasks", &admin).await?).await?;
    assert_eq!(body["data"]["stats"]["total"], 1);
    assert_eq!(body["data"]["stats"]["upcoming"], 1);
    Ok(())
}

#[tokio::test]
async fn assignee_completes_but_cannot_reassign() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;
    let (beto, _) = server.user_with_token("beto@koop.test").await?;

    let task = create_task(&server, &admin, ana.id, 5).await?;
    let path = format!("/api/tasks/{}", task["id"].as_str().unwrap_or_default());

    let res = server.patch_json(&path, &ana_token, &json!({ "assignedTo": beto.id })).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (status, body) = read(server.patch_json(&path, &ana_token, &json!({ "status": "completada" })).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completada");
    assert_eq!(body["data"]["daysRemaining"], 0);
    assert!(body["data"]["completedDate"].is_string());

    let res = server.patch_json(&path, &ana_token, &json!({ "status": "archivada" })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn comments_and_dashboard() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;

    let task = create_task(&server, &admin, ana.id, 2).await?;
    let path = format!("/api/tasks/{}/comments", task["id"].as_str().unwrap_or_default());

    let (status, body) = read(server.post_json(&path, &ana_token, &json!({ "text": "Radicado hoy" })).await?).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["comments"][0]["text"], "Radicado hoy");
    assert_eq!(body["data"]["comments"][0]["user"], json!(ana.id));

    let res = server.post_json(&path, &ana_token, &json!({ "text": "   " })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, body) = read(server.get("/api/tasks/dashboard", &ana_token).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["counters"]["total"], 1);
    assert_eq!(body["data"]["counters"]["pending"], 1);
    assert_eq!(body["data"]["counters"]["upcoming"], 1);
    assert_eq!(body["data"]["nextTasks"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn only_admins_create_and_delete() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;

    let res = server
        .post_json(
            "/api/tasks",
            &ana_token,
            &json!({ "title": "x", "dueDate": Utc::now().to_rfc3339(), "assignedTo": ana.id }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let task = create_task(&server, &admin, ana.id, 1).await?;
    let path = format!("/api/tasks/{}", task["id"].as_str().unwrap_or_default());

    let res = server.delete(&path, &ana_token).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server.delete(&path, &admin).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(&path, &ana_token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
