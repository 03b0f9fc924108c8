//! Append-only, hash-chained audit log.
//!
//! Every entry stores `hash = sha256(prev_hash || canonical payload)` where
//! `prev_hash` is the hash of the entry with the next lower `seq`. Appends are
//! serialized so the chain has no forks.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::authz::{Role, TenantContext};
use crate::errors::{AppError, AppResult};
use crate::models::audit::{AuditLogEntry, AuditQuery};
use crate::utils::{new_id, utc_now};

pub mod auditable;
pub use auditable::{Auditable, Severity};

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 1000;

/// Request context for audit entries (IP, User-Agent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from Axum request headers
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// One decision or mutation to be appended.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub actor_email: String,
    pub actor_role: Option<Role>,
    pub action_type: String,
    pub resource_type: String,
    pub resource_id: String,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub description: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub severity: Severity,
    pub origin: RequestContext,
}

impl AuditRecord {
    pub fn new(
        actor: &TenantContext,
        action_type: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let action_type = action_type.into();
        Self {
            actor_email: actor.email().to_string(),
            actor_role: actor.is_known().then(|| actor.role()),
            description: action_type.clone(),
            action_type,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            client_id: None,
            project_id: None,
            success: true,
            error_message: None,
            severity: Severity::Important,
            origin: RequestContext::default(),
        }
    }

    /// Record for `action` on an auditable entity; the action name becomes
    /// `"{resource_type}.{action}"`.
    pub fn for_entity<T: Auditable>(actor: &TenantContext, action: &str, entity: &T) -> Self {
        let mut record = Self::new(
            actor,
            format!("{}.{}", T::resource_type(), action),
            T::resource_type(),
            entity.resource_id(),
        );
        record.client_id = entity.client_scope().map(str::to_string);
        record.project_id = entity.project_scope().map(str::to_string);
        record.severity = entity.severity_for_action(action);
        record
    }

    pub fn with_scope(mut self, client_id: Option<&str>, project_id: Option<&str>) -> Self {
        self.client_id = client_id.map(str::to_string);
        self.project_id = project_id.map(str::to_string);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_origin(mut self, origin: &RequestContext) -> Self {
        self.origin = origin.clone();
        self
    }

    pub fn critical(mut self) -> Self {
        self.severity = Severity::Critical;
        self
    }

    /// Read-side record, kept out of critical reviews.
    pub fn noise(mut self) -> Self {
        self.severity = Severity::Noise;
        self
    }

    /// Marks the record as a rejected attempt.
    pub fn failed(mut self, err: &AppError) -> Self {
        self.success = false;
        self.error_message = Some(err.to_string());
        self.severity = Severity::Critical;
        self
    }
}

/// Fields covered by the hash, in a fixed order.
#[derive(Serialize)]
struct ChainPayload<'a> {
    id: &'a str,
    occurred_at: String,
    actor_email: &'a str,
    actor_role: Option<&'a str>,
    action_type: &'a str,
    resource_type: &'a str,
    resource_id: &'a str,
    client_id: Option<&'a str>,
    project_id: Option<&'a str>,
    description: &'a str,
    success: bool,
    error_message: Option<&'a str>,
    severity: &'a str,
    ip_address: Option<&'a str>,
    user_agent: Option<&'a str>,
}

impl<'a> ChainPayload<'a> {
    fn of(entry: &'a AuditLogEntry) -> Self {
        Self {
            id: &entry.id,
            occurred_at: canonical_time(entry.occurred_at),
            actor_email: &entry.actor_email,
            actor_role: entry.actor_role.as_deref(),
            action_type: &entry.action_type,
            resource_type: &entry.resource_type,
            resource_id: &entry.resource_id,
            client_id: entry.client_id.as_deref(),
            project_id: entry.project_id.as_deref(),
            description: &entry.description,
            success: entry.success,
            error_message: entry.error_message.as_deref(),
            severity: &entry.severity,
            ip_address: entry.ip_address.as_deref(),
            user_agent: entry.user_agent.as_deref(),
        }
    }
}

fn canonical_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn chain_hash(prev_hash: Option<&str>, entry: &AuditLogEntry) -> AppResult<String> {
    let payload = serde_json::to_string(&ChainPayload::of(entry))
        .map_err(|err| AppError::internal(format!("failed to encode audit payload: {err}")))?;

    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Result of recomputing the hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChainReport {
    pub entries: usize,
    pub valid: bool,
    /// `seq` of the first entry whose link or hash does not match.
    pub first_broken_seq: Option<i64>,
}

#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
    append_lock: Arc<Mutex<()>>,
}

impl AuditLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Appends `record` and returns its entry id.
    ///
    /// A storage failure is logged and swallowed; the id is still returned so
    /// the triggering decision is never rolled back.
    pub async fn log(&self, record: AuditRecord) -> String {
        let id = new_id("audit");

        if let Err(err) = self.append(&id, &record).await {
            tracing::warn!(
                audit_id = %id,
                action = %record.action_type,
                resource_id = %record.resource_id,
                error = %err,
                "failed to write audit entry"
            );
        }

        id
    }

    async fn append(&self, id: &str, record: &AuditRecord) -> AppResult<()> {
        let _guard = self.append_lock.lock().await;

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        let mut entry = AuditLogEntry {
            id: id.to_string(),
            seq: 0,
            occurred_at: utc_now().trunc_subsecs(3),
            actor_email: record.actor_email.clone(),
            actor_role: record.actor_role.map(|role| role.as_str().to_string()),
            action_type: record.action_type.clone(),
            resource_type: record.resource_type.clone(),
            resource_id: record.resource_id.clone(),
            client_id: record.client_id.clone(),
            project_id: record.project_id.clone(),
            description: record.description.clone(),
            success: record.success,
            error_message: record.error_message.clone(),
            severity: record.severity.as_str().to_string(),
            ip_address: record.origin.ip.clone(),
            user_agent: record.origin.user_agent.clone(),
            prev_hash: prev_hash.clone(),
            hash: String::new(),
        };
        entry.hash = chain_hash(prev_hash.as_deref(), &entry)?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, occurred_at, actor_email, actor_role, action_type, resource_type, resource_id,
                client_id, project_id, description, success, error_message, severity,
                ip_address, user_agent, prev_hash, hash
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.occurred_at)
        .bind(&entry.actor_email)
        .bind(&entry.actor_role)
        .bind(&entry.action_type)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.client_id)
        .bind(&entry.project_id)
        .bind(&entry.description)
        .bind(entry.success)
        .bind(&entry.error_message)
        .bind(&entry.severity)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.prev_hash)
        .bind(&entry.hash)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            audit_id = %entry.id,
            action = %entry.action_type,
            success = entry.success,
            "audit entry appended"
        );

        Ok(())
    }

    /// Newest entries first.
    pub async fn list(&self, query: &AuditQuery) -> AppResult<Vec<AuditLogEntry>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, seq, occurred_at, actor_email, actor_role, action_type, resource_type, resource_id, \
             client_id, project_id, description, success, error_message, severity, ip_address, user_agent, \
             prev_hash, hash FROM audit_log WHERE 1 = 1",
        );

        if let Some(resource_type) = query.resource_type.as_ref() {
            builder.push(" AND resource_type = ").push_bind(resource_type);
        }
        if let Some(resource_id) = query.resource_id.as_ref() {
            builder.push(" AND resource_id = ").push_bind(resource_id);
        }
        if let Some(actor_email) = query.actor_email.as_ref() {
            builder.push(" AND actor_email = ").push_bind(actor_email.to_lowercase());
        }
        builder.push(" ORDER BY seq DESC LIMIT ").push_bind(limit);

        let entries = builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Recomputes every link of the chain in `seq` order.
    pub async fn verify_chain(&self) -> AppResult<ChainReport> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            "SELECT id, seq, occurred_at, actor_email, actor_role, action_type, resource_type, resource_id, \
             client_id, project_id, description, success, error_message, severity, ip_address, user_agent, \
             prev_hash, hash FROM audit_log ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut prev: Option<&str> = None;
        for entry in &entries {
            let linked = entry.prev_hash.as_deref() == prev;
            let recomputed = chain_hash(prev, entry)?;

            if !linked || recomputed != entry.hash {
                tracing::warn!(seq = entry.seq, audit_id = %entry.id, "audit chain broken");
                return Ok(ChainReport {
                    entries: entries.len(),
                    valid: false,
                    first_broken_seq: Some(entry.seq),
                });
            }
            prev = Some(&entry.hash);
        }

        Ok(ChainReport {
            entries: entries.len(),
            valid: true,
            first_broken_seq: None,
        })
    }
}
