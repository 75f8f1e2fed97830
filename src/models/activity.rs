use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    #[schema(example = "member.invited")]
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    #[schema(example = "critical")]
    pub severity: String,
    #[schema(value_type = Object)]
    pub properties: Value,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityEntry {
    pub id: Uuid,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
    pub properties: String,
}

impl From<DbActivityEntry> for ActivityEntry {
    fn from(value: DbActivityEntry) -> Self {
        ActivityEntry {
            id: value.id,
            event_name: value.event_name,
            description: value.description,
            actor_id: value.actor_id,
            occurred_at: value.occurred_at,
            severity: value.severity,
            properties: serde_json::from_str(&value.properties).unwrap_or(Value::Null),
        }
    }
}
