mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{read, TestServer, ADMIN_EMAIL};

#[tokio::test]
async fn owner_reads_and_edits_contact_fields() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;
    let (_, beto_token) = server.user_with_token("beto@koop.test").await?;

    let res = server.get("/api/clients/me", &ana_token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .post_json(
            "/api/admin/clients",
            &admin,
            &json!({ "userId": ana.id, "documentNumber": " 1020 ", "fullName": "Ana Pérez" }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["documentNumber"], "1020");
    assert_eq!(body["data"]["email"], "ana@koop.test");
    let path = format!("/api/clients/{}", body["data"]["id"].as_str().unwrap_or_default());

    let (status, body) = read(server.get("/api/clients/me", &ana_token).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Ana Pérez");

    // Strangers cannot tell the profile exists
    let res = server.get(&path, &beto_token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let (status, body) = read(server.patch_json(&path, &ana_token, &json!({ "phone": "3001234567" })).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "3001234567");

    let res = server.patch_json(&path, &ana_token, &json!({ "documentNumber": "999" })).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (status, body) = read(server.patch_json(&path, &admin, &json!({ "documentNumber": "2030" })).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["documentNumber"], "2030");
    Ok(())
}

#[tokio::test]
async fn admin_lists_and_assigns_clients() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, _) = server.user_with_token("ana@koop.test").await?;
    let (beto, _) = server.user_with_token("beto@koop.test").await?;
    let admin_id = server
        .stores
        .identities
        .find_by_email(ADMIN_EMAIL)
        .await?
        .map(|i| i.id)
        .unwrap_or_default();

    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id, "documentNumber": "1020" }))
        .await?;
    let (_, body) = read(res).await?;
    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = read(server.get("/api/admin/clients", &admin).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["owner"]["email"], "ana@koop.test");

    let assign = format!("/api/admin/clients/{}/assign", id);
    let res = server.patch_json(&assign, &admin, &json!({ "adminId": beto.id })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, body) = read(server.patch_json(&assign, &admin, &json!({ "adminId": admin_id })).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["assignedAdmin"], json!(admin_id));

    let (_, body) = read(server.patch_json(&assign, &admin, &json!({ "adminId": null })).await?).await?;
    assert!(body["data"]["assignedAdmin"].is_null());
    Ok(())
}

#[tokio::test]
async fn duplicate_clients_conflict() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, _) = server.user_with_token("ana@koop.test").await?;
    let (beto, _) = server.user_with_token("beto@koop.test").await?;

    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id, "documentNumber": "1020" }))
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Same owner
    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id, "documentNumber": "3040" }))
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Same document number
    let (status, body) = read(
        server
            .post_json("/api/admin/clients", &admin, &json!({ "userId": beto.id, "documentNumber": "1020" }))
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // Neither request nor account carries a number
    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": beto.id }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn document_numbers_must_name_one_folder() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (ana, ana_token) = server.user_with_token("ana@koop.test").await?;

    for bad in ["123/45", "PAÑ123", "../999"] {
        let res = server
            .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id, "documentNumber": bad }))
            .await?;
        let (status, body) = read(res).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}: {}", bad, body);
    }

    // A number planted on the account is checked the same way
    let path = format!("/api/admin/users/{}", ana.id);
    let res = server.patch_json(&path, &admin, &json!({ "documentNumber": "123/45" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .post_json("/api/admin/clients", &admin, &json!({ "userId": ana.id, "documentNumber": "PAN123" }))
        .await?;
    let (_, body) = read(res).await?;
    let client_path = format!("/api/clients/{}", body["data"]["id"].as_str().unwrap_or_default());
    let res = server
        .patch_json(&client_path, &admin, &json!({ "documentNumber": "PAN 123" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The owner's uploads and listings agree on one folder
    let (status, body) = read(server.upload(&ana_token, Some("clientes"), "a.txt", "x").await?).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["data"]["key"].as_str().unwrap_or_default().starts_with("koop/clientes/PAN123/"));
    let (status, body) = read(server.get("/api/docs/client/PAN123", &ana_token).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);
    Ok(())
}
