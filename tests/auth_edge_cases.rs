mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn auth_edge_cases() -> Result<()> {
    let t = common::spawn_app().await?;

    // 1. Register with short password
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Short Pass", "email": "short@example.com", "password": "short" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Should fail with bad request for short password");

    // 2. Register with valid user; email stored lowercased
    let user = t.register("Valid User", "Valid@Example.com").await?;
    let (status, body) = t.send("GET", "/auth/me", Some(&user.token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "valid@example.com");
    assert_eq!(body["role"], "user");

    // 3. Same email in another case is taken
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "name": "Dup", "email": "VALID@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // 4. Login with wrong password
    let (status, body) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "valid@example.com", "password": "wrongpassword" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for wrong password");
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "invalid credentials");

    // 5. Login with non-existent email
    let (status, _) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for non-existent user");

    // 6. Login succeeds with mixed-case email
    let (status, body) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "VALID@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    // 7. Access protected route without token, and with a garbage token
    let (status, _) = t.send("GET", "/projects", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "Should fail with unauthorized for missing token");
    let (status, _) = t.send("GET", "/projects", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn token_of_deleted_user_is_rejected() -> Result<()> {
    let t = common::spawn_app().await?;
    let user = t.register("Gone", "gone@example.com").await?;

    sqlx::query("UPDATE users SET deleted_at = '2025-01-01T00:00:00Z' WHERE email = ?")
        .bind(&user.email)
        .execute(&t.pool)
        .await?;

    let (status, _) = t.send("GET", "/projects", Some(&user.token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}
