mod common;

use std::str::FromStr;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn transfer_racing_with_heir_leaving_keeps_exactly_one_owner() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Olive Owner", "owner@example.com").await?;
    let heir = t.register("Hank Heir", "heir@example.com").await?;

    for round in 0..10 {
        let project_id = t.create_project(&owner, &format!("RACE{round}")).await?;
        let (status, _) = t.invite(&owner, &project_id, &heir, "member").await?;
        assert_eq!(status, StatusCode::CREATED);

        let transfer_uri = format!("/projects/{}/transfer-ownership", project_id);
        let leave_uri = format!("/projects/{}/members/{}", project_id, heir.id);
        let (transfer, leave) = tokio::join!(
            t.send("POST", &transfer_uri, Some(&owner.token), Some(json!({ "user_id": heir.id }))),
            t.send("DELETE", &leave_uri, Some(&heir.token), None),
        );
        let (transfer_status, transfer_body) = transfer?;
        let (leave_status, leave_body) = leave?;

        assert!(
            matches!(
                (transfer_status, leave_status),
                (StatusCode::OK, StatusCode::BAD_REQUEST) | (StatusCode::BAD_REQUEST, StatusCode::NO_CONTENT)
            ),
            "round {round}: transfer={transfer_status} {transfer_body} leave={leave_status} {leave_body}"
        );

        let project_uuid = Uuid::from_str(&project_id)?;
        let owners: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM project_members WHERE project_id = ? AND role = 'owner'")
                .bind(project_uuid)
                .fetch_all(&t.pool)
                .await?;
        let owner_id: Uuid = sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = ?")
            .bind(project_uuid)
            .fetch_one(&t.pool)
            .await?;

        assert_eq!(owners, vec![owner_id], "round {round}");
        let expected = if transfer_status == StatusCode::OK { &heir.id } else { &owner.id };
        assert_eq!(owner_id.to_string(), *expected, "round {round}");
    }

    Ok(())
}

#[tokio::test]
async fn concurrent_creates_with_same_key_conflict_instead_of_failing() -> Result<()> {
    let t = common::spawn_app().await?;
    let alice = t.register("Alice", "alice@example.com").await?;
    let bob = t.register("Bob", "bob@example.com").await?;

    for round in 0..10 {
        let key = format!("DUP{round}");
        let body = json!({ "key": key, "name": "Duplicate" });
        let (first, second) = tokio::join!(
            t.send("POST", "/projects", Some(&alice.token), Some(body.clone())),
            t.send("POST", "/projects", Some(&bob.token), Some(body.clone())),
        );
        let mut results = vec![first?, second?];
        results.sort_by_key(|(status, _)| status.as_u16());

        assert_eq!(results[0].0, StatusCode::CREATED, "round {round}: {:?}", results);
        assert_eq!(results[1].0, StatusCode::CONFLICT, "round {round}: {:?}", results);
        assert_eq!(results[1].1["error"], "conflict");
        assert_eq!(results[1].1["message"], format!("project key {key} is already in use"));
    }

    Ok(())
}

#[tokio::test]
async fn concurrent_invites_of_same_user_conflict_instead_of_failing() -> Result<()> {
    let t = common::spawn_app().await?;
    let owner = t.register("Olive Owner", "owner@example.com").await?;
    let admin = t.register("Ada Admin", "admin@example.com").await?;
    let guest = t.register("Gus Guest", "guest@example.com").await?;

    for round in 0..10 {
        let project_id = t.create_project(&owner, &format!("INV{round}")).await?;
        let (status, _) = t.invite(&owner, &project_id, &admin, "admin").await?;
        assert_eq!(status, StatusCode::CREATED);

        let (first, second) = tokio::join!(
            t.invite(&owner, &project_id, &guest, "member"),
            t.invite(&admin, &project_id, &guest, "member"),
        );
        let mut statuses = vec![first?.0.as_u16(), second?.0.as_u16()];
        statuses.sort_unstable();

        assert_eq!(statuses, vec![201, 409], "round {round}");
    }

    Ok(())
}
