#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use project_desk::admin::set_system_role;
use project_desk::authz::UserRole;
use project_desk::create_app;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

/// Fresh SQLite file with migrations applied and a router on top of it.
pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };

        Ok((status, value))
    }

    pub async fn register(&self, name: &str, email: &str) -> Result<TestUser> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "password123" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        Ok(TestUser {
            id: body["user"]["id"].as_str().context("missing user id")?.to_string(),
            email: email.to_string(),
            token: body["token"].as_str().context("missing token")?.to_string(),
        })
    }

    pub async fn create_project(&self, owner: &TestUser, key: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/projects",
                Some(&owner.token),
                Some(json!({ "key": key, "name": format!("Project {}", key), "description": "desc" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "project create failed: {}", body);

        Ok(body["id"].as_str().context("missing project id")?.to_string())
    }

    pub async fn invite(&self, inviter: &TestUser, project_id: &str, invitee: &TestUser, role: &str) -> Result<(StatusCode, Value)> {
        self.send(
            "POST",
            &format!("/projects/{}/members", project_id),
            Some(&inviter.token),
            Some(json!({ "email": invitee.email, "role": role })),
        )
        .await
    }

    pub async fn promote_to_system_admin(&self, user: &TestUser) -> Result<()> {
        set_system_role(&self.pool, &user.email, UserRole::Admin).await?;
        Ok(())
    }
}
