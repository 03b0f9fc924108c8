use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One append-only audit record. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct AuditLogEntry {
    pub id: String,
    pub seq: i64,
    pub occurred_at: DateTime<Utc>,
    pub actor_email: String,
    pub actor_role: Option<String>,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub description: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub severity: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub actor_email: Option<String>,
    pub limit: Option<i64>,
}
