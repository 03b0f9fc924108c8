use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::document::AccessState;
use crate::models::tenant::parse_stored;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Denied,
}

impl AccessRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "pending",
            AccessRequestStatus::Approved => "approved",
            AccessRequestStatus::Denied => "denied",
        }
    }
}

impl FromStr for AccessRequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccessRequestStatus::Pending),
            "approved" => Ok(AccessRequestStatus::Approved),
            "denied" => Ok(AccessRequestStatus::Denied),
            other => Err(AppError::validation(format!("unknown access request status: {other}"))),
        }
    }
}

/// Outcome of an owner review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn status(self) -> AccessRequestStatus {
        match self {
            Decision::Approve => AccessRequestStatus::Approved,
            Decision::Deny => AccessRequestStatus::Denied,
        }
    }

    /// Gate state the document moves to.
    pub fn access_state(self) -> AccessState {
        match self {
            Decision::Approve => AccessState::AccessGranted,
            Decision::Deny => AccessState::AccessDenied,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessRequest {
    pub id: String,
    pub requester_email: String,
    /// Owner whose approval unlocks the document.
    pub owner_email: String,
    pub document_id: String,
    pub status: AccessRequestStatus,
    pub bulk_request_id: Option<String>,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAccessRequest {
    pub id: String,
    pub requester_email: String,
    pub owner_email: String,
    pub document_id: String,
    pub status: String,
    pub bulk_request_id: Option<String>,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
}

impl TryFrom<DbAccessRequest> for AccessRequest {
    type Error = AppError;

    fn try_from(value: DbAccessRequest) -> Result<Self, Self::Error> {
        Ok(AccessRequest {
            status: parse_stored(&value.status)?,
            id: value.id,
            requester_email: value.requester_email,
            owner_email: value.owner_email,
            document_id: value.document_id,
            bulk_request_id: value.bulk_request_id,
            reason: value.reason,
            requested_at: value.requested_at,
            reviewed_at: value.reviewed_at,
            reviewed_by: value.reviewed_by,
            review_notes: value.review_notes,
        })
    }
}

/// Aggregate for one request fanned out across many documents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct BulkAccessRequest {
    pub id: String,
    pub owner_email: String,
    pub requested_by: String,
    pub total_documents: i64,
    pub pending_count: i64,
    pub approved_count: i64,
    pub denied_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkAccessRequest {
    pub fn is_consistent(&self) -> bool {
        self.pending_count + self.approved_count + self.denied_count == self.total_documents
    }
}

/// `owner_email` may be omitted when the document already records an owner,
/// and must match it when both are present.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessRequestCreateRequest {
    #[schema(example = "owner@client.example")]
    pub owner_email: Option<String>,
    pub reason: Option<String>,
}

/// All documents of a bulk request share one owner.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAccessRequestCreateRequest {
    pub document_ids: Vec<String>,
    #[schema(example = "owner@client.example")]
    pub owner_email: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAccessRequestResponse {
    pub bulk: BulkAccessRequest,
    pub requests: Vec<AccessRequest>,
}

/// Listing filter for the store.
#[derive(Debug, Clone, Default)]
pub struct AccessRequestQuery {
    pub status: Option<AccessRequestStatus>,
    /// `None` lists every request.
    pub involving: Option<RequestScope>,
    pub limit: i64,
}

/// Requests a caller might see: the ones they opened or own, and those on
/// documents inside their client or project scope.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    pub email: String,
    pub client_ids: Vec<String>,
    pub project_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub notes: Option<String>,
}
