mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn create_list_update_project() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Owner", "owner@example.com").await?;

    let (status, body) = t
        .send(
            "POST",
            "/projects",
            Some(&owner.token),
            Some(json!({ "key": " launch ", "name": "  Launch Planning ", "description": "" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["key"], "LAUNCH");
    assert_eq!(body["name"], "Launch Planning");
    assert_eq!(body["description"], serde_json::Value::Null);
    assert_eq!(body["role"], "owner");
    assert_eq!(body["owner_id"], owner.id.as_str());
    let project_id = body["id"].as_str().unwrap().to_string();

    // key is unique among live projects
    let (status, body) = t
        .send("POST", "/projects", Some(&owner.token), Some(json!({ "key": "LAUNCH", "name": "Again" })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, _) = t
        .send("POST", "/projects", Some(&owner.token), Some(json!({ "key": "1X", "name": "Bad key" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t.send("GET", "/projects", Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], project_id.as_str());
    assert_eq!(list[0]["role"], "owner");

    let (status, body) = t
        .send(
            "PUT",
            &format!("/projects/{}", project_id),
            Some(&owner.token),
            Some(json!({ "name": "Launch v2", "description": "Ship it" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Launch v2");
    assert_eq!(body["description"], "Ship it");
    assert_eq!(body["key"], "LAUNCH");

    let (status, body) = t.send("GET", &format!("/projects/{}", project_id), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Launch v2");

    Ok(())
}

#[tokio::test]
async fn non_member_cannot_see_project() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Owner", "owner@example.com").await?;
    let stranger = t.register("Stranger", "stranger@example.com").await?;
    let project_id = t.create_project(&owner, "SECRET").await?;

    let (status, body) = t.send("GET", &format!("/projects/{}", project_id), Some(&stranger.token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["message"], "You don't have access to this project. Contact project owner.");

    let (status, body) = t.send("GET", "/projects", Some(&stranger.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let missing = uuid::Uuid::new_v4();
    let (status, _) = t.send("GET", &format!("/projects/{}", missing), Some(&stranger.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn archive_restore_delete() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Owner", "owner@example.com").await?;
    let project_id = t.create_project(&owner, "ARCH").await?;
    let base = format!("/projects/{}", project_id);

    let (status, body) = t.send("POST", &format!("{}/archive", base), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["archived_at"].is_string());

    let (status, _) = t.send("POST", &format!("{}/archive", base), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send("PUT", &base, Some(&owner.token), Some(json!({ "name": "Edited" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = t.send("GET", "/projects?archived=true", Some(&owner.token), None).await?;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = t.send("GET", "/projects?archived=false", Some(&owner.token), None).await?;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = t.send("POST", &format!("{}/restore", base), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["archived_at"], serde_json::Value::Null);

    let (status, _) = t.send("POST", &format!("{}/restore", base), Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t.send("DELETE", &base, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t.send("GET", &base, Some(&owner.token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // deleted keys can be reused
    t.create_project(&owner, "ARCH").await?;

    Ok(())
}

#[tokio::test]
async fn owner_permission_summary() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Owner", "owner@example.com").await?;
    let project_id = t.create_project(&owner, "PERM").await?;

    let (status, body) = t
        .send("GET", &format!("/projects/{}/permissions", project_id), Some(&owner.token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "owner");
    assert_eq!(body["is_system_admin"], false);

    let permissions = body["permissions"].as_object().unwrap();
    assert_eq!(permissions.len(), 13);
    assert!(permissions.values().all(|allowed| allowed == true));
    assert!(permissions.contains_key("card-types:manage"));

    Ok(())
}
